//! Google Cloud resources
//!
//! [`Gke`] and [`CloudSqlInstance`] drive their control planes through the
//! [`ClusterManager`] and [`SqlAdmin`] traits. The REST implementations talk
//! to the public APIs with a bearer token supplied in [`GcpCredentials`].
//! [`CloudSqlDatabase`] and [`CloudSqlUser`] live inside an instance and
//! depend on its outputs.

pub mod client;
pub mod cloudsql;
pub mod cloudsql_database;
pub mod cloudsql_user;
pub mod container;
pub mod error;
pub mod gke;
pub mod logging;
pub mod sqladmin;

pub use client::{GcpCredentials, RestClient};
pub use cloudsql::{CloudSqlConfig, CloudSqlInstance, CloudSqlOutputs, DatabaseFamily};
pub use cloudsql_database::{CloudSqlDatabase, CloudSqlDatabaseConfig, CloudSqlDatabaseOutputs};
pub use cloudsql_user::{CloudSqlUser, CloudSqlUserConfig, CloudSqlUserOutputs};
pub use container::{Cluster, ClusterManager, ReleaseChannel, RestClusterManager};
pub use error::{GcpError, Result};
pub use gke::{Gke, GkeConfig, GkeOutputs};
pub use logging::{CloudLogEntry, LogReader, RestLogReader};
pub use sqladmin::{RestSqlAdmin, SqlAdmin, SqlInstance, SqlUser, UserRequest};
