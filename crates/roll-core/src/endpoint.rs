//! Physical endpoints: entry points (gateways) and the devices that scan at
//! them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Gateways ────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GatewayKind {
  /// A campus perimeter gate.
  Gate,
  Classroom,
}

/// A place where scans happen, addressed by a stable `code` such as
/// `MAIN_GATE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gateway {
  pub gateway_id:   Uuid,
  pub code:         String,
  pub display_name: String,
  pub location:     String,
  pub kind:         GatewayKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewGateway {
  pub code:         String,
  pub display_name: String,
  #[serde(default)]
  pub location:     String,
  pub kind:         GatewayKind,
}

impl NewGateway {
  pub fn validate(&self) -> Result<()> {
    if self.code.trim().is_empty() {
      return Err(Error::EmptyField("code"));
    }
    if self.display_name.trim().is_empty() {
      return Err(Error::EmptyField("display_name"));
    }
    Ok(())
  }
}

// ─── Devices ─────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeviceKind {
  Mobile,
  Scanner,
  Tablet,
}

/// The hardware or software agent performing a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
  pub device_id:   Uuid,
  pub device_code: String,
  pub device_name: String,
  pub kind:        DeviceKind,
  pub is_active:   bool,
  /// Stamped on every successful scan; `None` until the first one.
  pub last_seen:   Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDevice {
  pub device_code: String,
  pub device_name: String,
  pub kind:        DeviceKind,
}

impl NewDevice {
  pub fn validate(&self) -> Result<()> {
    if self.device_code.trim().is_empty() {
      return Err(Error::EmptyField("device_code"));
    }
    if self.device_name.trim().is_empty() {
      return Err(Error::EmptyField("device_name"));
    }
    Ok(())
  }
}
