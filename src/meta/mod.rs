//! Cluster metadata schema and its filesystem-backed store

pub mod spec;
pub mod store;

pub use spec::{ClusterMeta, GlobalOptions, InstanceSpec, Role, Topology};
pub use store::MetaStore;
