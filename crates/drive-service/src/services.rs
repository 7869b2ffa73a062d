//! Wiring of every drive service over one store and one object storage.

use std::sync::Arc;

use drive_auth::{AccessResolver, JwtEncoder, JwtIdentityProvider, PasswordHasher};
use drive_core::config::AppConfig;
use drive_core::error::AppError;
use drive_core::result::AppResult;
use drive_core::traits::{IdentityProvider, ObjectStorage};
use drive_database::DriveStore;

use crate::bin::BinService;
use crate::context::RequestContext;
use crate::hierarchy::HierarchyService;
use crate::quota::QuotaService;
use crate::share::ShareService;
use crate::upload::UploadService;
use crate::user::UserService;

/// Every drive service, sharing one store.
#[derive(Debug, Clone)]
pub struct DriveServices {
    /// Bearer token verification.
    pub identity: Arc<dyn IdentityProvider>,
    /// Access resolution.
    pub access: Arc<AccessResolver>,
    /// Accounts.
    pub users: UserService,
    /// Entry tree.
    pub hierarchy: HierarchyService,
    /// Share groups.
    pub shares: ShareService,
    /// Uploads.
    pub uploads: UploadService,
    /// Quota ledger.
    pub quota: Arc<QuotaService>,
    /// Bin lifecycle.
    pub bin: BinService,
}

impl DriveServices {
    /// Builds all services from configuration.
    pub fn new(
        store: Arc<dyn DriveStore>,
        storage: Arc<dyn ObjectStorage>,
        config: &AppConfig,
    ) -> AppResult<Self> {
        if config.auth.jwt_secret.is_empty() {
            return Err(AppError::configuration("auth.jwt_secret must be set"));
        }
        let drive = &config.drive;

        let access = Arc::new(AccessResolver::new(Arc::clone(&store)));
        let quota = Arc::new(QuotaService::new(
            Arc::clone(&store),
            Arc::clone(&access),
            drive.quota_bytes,
        ));

        Ok(Self {
            identity: Arc::new(JwtIdentityProvider::new(&config.auth)),
            users: UserService::new(
                Arc::clone(&store),
                Arc::new(PasswordHasher::new()),
                Arc::new(JwtEncoder::new(&config.auth)),
            ),
            hierarchy: HierarchyService::new(
                Arc::clone(&store),
                Arc::clone(&access),
                Arc::clone(&storage),
                drive.max_name_length,
            ),
            shares: ShareService::new(Arc::clone(&store), Arc::clone(&access)),
            uploads: UploadService::new(
                Arc::clone(&store),
                Arc::clone(&quota),
                Arc::clone(&storage),
                drive.max_name_length,
            ),
            bin: BinService::new(
                Arc::clone(&store),
                Arc::clone(&access),
                storage,
                drive.bin_retention()?,
            ),
            quota,
            access,
        })
    }

    /// Verifies a bearer token and builds the request context.
    pub async fn authenticate(&self, token: &str) -> AppResult<RequestContext> {
        let identity = self.identity.verify(token).await?;
        Ok(RequestContext::new(identity))
    }
}
