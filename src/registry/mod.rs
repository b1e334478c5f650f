//! Registry client abstraction.
//!
//! The registry mirrors workload identity, name, namespace and labels. It is
//! keyed by workload ID and spoken to over plain HTTP+JSON:
//!
//! | Operation | Method | Path | Success |
//! |---|---|---|---|
//! | exists / fetch | GET | `{base}/{id}` | 200 |
//! | create | POST | `{base}` | 201 |
//! | update | PATCH | `{base}/{id}` | 2xx |
//! | delete | DELETE | `{base}/{id}` | 2xx |
//! | list | GET | `{base}` | 200 |

mod http_client;
pub use http_client::*;


use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::RegistryRecord;
use crate::Result;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait RegistryClient: Send + Sync + 'static {
    /// `true` only on 200. Any other status means absent; a transport
    /// failure is an error, never "absent".
    async fn exists(
        &self,
        id: &str,
    ) -> Result<bool>;

    /// Current record, `None` if the registry does not know the ID
    async fn fetch(
        &self,
        id: &str,
    ) -> Result<Option<RegistryRecord>>;

    /// Registers a new record. A status other than 201 is logged, not
    /// returned; the follow-up update confirms the write.
    async fn create(
        &self,
        record: &RegistryRecord,
    ) -> Result<()>;

    /// Idempotent convergence primitive
    async fn update(
        &self,
        id: &str,
        record: &RegistryRecord,
    ) -> Result<()>;

    /// Removes a record. An ID the registry does not know counts as removed.
    async fn delete(
        &self,
        id: &str,
    ) -> Result<()>;

    async fn list(&self) -> Result<Vec<RegistryRecord>>;
}
