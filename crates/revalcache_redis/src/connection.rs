// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use redis::{Cmd, FromRedisValue, RedisError, aio::ConnectionManager, cluster::ClusterClient, cluster_async::ClusterConnection};
use revalcache_tier::Error;

use crate::config::Topology;

/// A multiplexed connection to either topology. Clones share the underlying connection.
#[derive(Clone)]
pub(crate) enum Connection {
    Single(ConnectionManager),
    Cluster(ClusterConnection),
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(_) => f.write_str("Connection::Single"),
            Self::Cluster(_) => f.write_str("Connection::Cluster"),
        }
    }
}

impl Connection {
    pub(crate) async fn open(topology: &Topology) -> Result<Self, Error> {
        match topology {
            Topology::Single { url } => {
                let client = redis::Client::open(url.as_str()).map_err(map_open_error)?;
                let manager = client.get_connection_manager().await.map_err(Error::backing)?;
                Ok(Self::Single(manager))
            }
            Topology::Cluster { nodes } => {
                if nodes.is_empty() {
                    return Err(Error::Config("cluster topology needs at least one node".to_owned()));
                }
                let client = ClusterClient::new(nodes.iter().map(String::as_str).collect::<Vec<_>>()).map_err(map_open_error)?;
                let connection = client.get_async_connection().await.map_err(Error::backing)?;
                Ok(Self::Cluster(connection))
            }
        }
    }

    pub(crate) async fn query<T>(&self, cmd: &Cmd) -> Result<T, Error>
    where
        T: FromRedisValue,
    {
        let result = match self.clone() {
            Self::Single(mut manager) => cmd.query_async::<T>(&mut manager).await,
            Self::Cluster(mut connection) => cmd.query_async::<T>(&mut connection).await,
        };
        result.map_err(Error::backing)
    }
}

fn map_open_error(error: RedisError) -> Error {
    if error.kind() == redis::ErrorKind::InvalidClientConfig {
        Error::Config(error.to_string())
    } else {
        Error::backing(error)
    }
}
