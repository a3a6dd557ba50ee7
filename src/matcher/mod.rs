mod domain;
mod ecs;
mod keyword;
mod netlist;

pub use domain::DomainList;
pub use ecs::EcsData;
pub use keyword::KeywordList;
pub use netlist::{compare_nets, NetList};
