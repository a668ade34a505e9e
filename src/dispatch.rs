//! Operator command dispatch.
//!
//! Every command is checked against a static allow-list of operator ids
//! before it reaches the registry.

use log::{info, warn};

use crate::actor::RegistryHandle;
use crate::registry::render_selection;
use crate::types::{Command, DeviceRecord, Outcome};

pub const UNAUTHORIZED: &str = "You are not authorized to use this tool.";

pub fn is_authorized(authorized_users: &[i64], user: i64) -> bool {
    authorized_users.contains(&user)
}

pub struct Dispatcher {
    registry: RegistryHandle,
    authorized_users: Vec<i64>,
}

impl Dispatcher {
    pub fn new(registry: RegistryHandle, authorized_users: Vec<i64>) -> Self {
        Self {
            registry,
            authorized_users,
        }
    }

    pub fn is_authorized(&self, user: i64) -> bool {
        is_authorized(&self.authorized_users, user)
    }

    pub async fn dispatch(&self, user: i64, command: Command) -> Outcome {
        if !self.is_authorized(user) {
            warn!("Rejected command from unauthorized user {}", user);
            return Outcome::fail(UNAUTHORIZED);
        }
        info!("User {} issued {:?}", user, command);

        match command {
            Command::Start => {
                let count = self.registry.count().await;
                Outcome::ok(format!(
                    "Device registry ready.\nConnected devices: {}",
                    count
                ))
            }
            Command::ViewDevices => Outcome::ok(self.registry.render_summary().await),
            Command::ListIds => Outcome::ok(render_selection(&self.registry.load_all().await)),
            Command::AddDevice { id, name, ip, extra } => {
                let mut record = DeviceRecord::new(id, name, ip);
                record.extra = extra;
                self.registry.add(record).await
            }
            Command::RemoveDevice { id } => self.registry.remove(id).await,
        }
    }
}
