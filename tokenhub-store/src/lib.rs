mod gateway;
mod generator;
mod settings;
mod store;
mod token;

use std::sync::Arc;

pub use gateway::*;
pub use generator::*;
pub use settings::*;
pub use store::*;
pub use token::*;

use log::info;
use tokenhub_core::{Config, GatewayKind, Role};

/// The tokenhub client system, handing out independent sessions against one backend.
pub struct Tokenhub {
    factory: Arc<dyn GatewayFactory>,
    options: StoreOptions,
}

/// Everything a single signed-in client works with.
/// Both halves share one gateway, so they act with the same credentials.
pub struct Session {
    pub store: DomainStore,
    pub settings: SettingsProjection,
}

impl Tokenhub {
    pub fn new<F>(factory: F, options: StoreOptions) -> Self
    where
        F: GatewayFactory + 'static,
    {
        Self {
            factory: Arc::new(factory),
            options,
        }
    }

    /// Connects to the configured backend, creating the bootstrap admin for the in-process one
    pub fn from_config(config: &Config) -> std::result::Result<Self, GatewayError> {
        let options = StoreOptions {
            signup_poll_interval: config.signup_poll_interval,
            signup_poll_timeout: config.signup_poll_timeout,
        };

        match config.gateway {
            GatewayKind::Supabase => {
                let missing =
                    || GatewayError::Validation("Supabase url and anon key are required".to_string());

                let url = config.supabase_url.as_deref().ok_or_else(missing)?;
                let anon_key = config.supabase_anon_key.as_deref().ok_or_else(missing)?;

                info!("Using the hosted backend at {}", url);
                Ok(Self::new(
                    SupabaseFactory::new(SupabaseConfig::new(url, anon_key)?),
                    options,
                ))
            }
            GatewayKind::Memory => {
                let backend = MemoryBackend::new();

                if let Some(admin) = &config.bootstrap_admin {
                    backend.create_account(
                        &admin.email,
                        &admin.password,
                        &admin.name,
                        Role::Admin,
                        0,
                    )?;
                }

                info!("Using the in-process backend, data is lost on exit");
                Ok(Self::new(backend, options))
            }
        }
    }

    pub fn session(&self) -> Session {
        let gateway = self.factory.connect();

        Session {
            store: DomainStore::new(gateway.clone(), self.options),
            settings: SettingsProjection::new(gateway),
        }
    }
}

#[cfg(test)]
mod test {
    use tokenhub_core::AdminBootstrap;

    use super::*;

    #[tokio::test]
    async fn test_bootstrap_admin() {
        let config = Config {
            bootstrap_admin: Some(AdminBootstrap {
                email: "root@example.com".to_string(),
                password: "secret".to_string(),
                name: "Root".to_string(),
            }),
            ..Default::default()
        };

        let hub = Tokenhub::from_config(&config).unwrap();

        let first = hub.session();
        let user = first.store.login("root@example.com", "secret").await.unwrap();
        assert_eq!(user.role, Role::Admin);

        // Sessions don't share state
        let second = hub.session();
        assert!(!second.store.snapshot().is_authenticated());
    }

    #[test]
    fn test_hosted_backend_needs_credentials() {
        let config = Config {
            gateway: GatewayKind::Supabase,
            ..Default::default()
        };

        assert!(Tokenhub::from_config(&config).is_err());
    }
}
