//! Message types of the Larch mutation-annotated DAG protobuf format (`dag.proto`).

/// A single-site mutation on an edge. Nucleotides are coded `0..=3` for `A, C, G, T`.
/// More than one `mut_nuc` entry means the child base is ambiguous over that set.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Mut {
    #[prost(int32, tag = "1")]
    pub position: i32,
    #[prost(int32, tag = "2")]
    pub par_nuc: i32,
    #[prost(int32, repeated, tag = "3")]
    pub mut_nuc: Vec<i32>,
    #[prost(string, tag = "4")]
    pub chromosome: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Edge {
    #[prost(int64, tag = "1")]
    pub edge_id: i64,
    #[prost(int64, tag = "2")]
    pub parent_node: i64,
    #[prost(int64, tag = "3")]
    pub parent_clade: i64,
    #[prost(int64, tag = "4")]
    pub child_node: i64,
    #[prost(message, repeated, tag = "5")]
    pub edge_mutations: Vec<Mut>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NodeName {
    #[prost(int64, tag = "1")]
    pub node_id: i64,
    #[prost(string, repeated, tag = "2")]
    pub condensed_leaves: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Data {
    #[prost(message, repeated, tag = "1")]
    pub edges: Vec<Edge>,
    #[prost(message, repeated, tag = "2")]
    pub node_names: Vec<NodeName>,
    #[prost(string, tag = "3")]
    pub reference_seq: String,
    #[prost(string, tag = "4")]
    pub reference_id: String,
}
