//! Generated gRPC wire types for the distributed file service, plus
//! conversions to and from `dfs_types::File`. `SPEC_FULL.md` §6.

mod convert;

tonic::include_proto!("dfs");

pub use convert::ConvertError;
