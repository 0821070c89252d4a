//! Typed controller operations
//!
//! Thin wrappers that pick the site path, build the JSON body and decode the
//! response envelope. Everything goes through the same pipeline as
//! [`Session::raw`].

use std::net::IpAddr;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::instrument;
use unigate_common::resilience::RequestContext;
use unigate_common::validation::{normalize_mac, normalize_macs, EndpointValidationError};
use unigate_domain::constants::{
    ACTIVE_CLIENTS_PATH, ALL_CLIENTS_PATH, ALL_EVENTS_PATH, DEVICES_PATH, RECENT_EVENTS_PATH,
    STATION_MANAGER_PATH, USER_REST_PATH,
};
use unigate_domain::{Client, Device, Event};

use super::{decode_envelope, Session, SessionError};

impl Session {
    /// Every adopted device of the site
    pub async fn get_devices(&self) -> Result<Vec<Device>, SessionError> {
        self.fetch(DEVICES_PATH).await
    }

    /// Currently connected clients
    pub async fn get_clients(&self) -> Result<Vec<Client>, SessionError> {
        self.fetch(ACTIVE_CLIENTS_PATH).await
    }

    /// Every client the controller has ever seen
    pub async fn get_all_clients(&self) -> Result<Vec<Client>, SessionError> {
        self.fetch(ALL_CLIENTS_PATH).await
    }

    pub async fn get_recent_events(&self) -> Result<Vec<Event>, SessionError> {
        self.fetch(RECENT_EVENTS_PATH).await
    }

    pub async fn get_all_events(&self) -> Result<Vec<Event>, SessionError> {
        self.fetch(ALL_EVENTS_PATH).await
    }

    /// Disconnect each station; it may reconnect immediately
    pub async fn kick<S: AsRef<str>>(&self, macs: &[S]) -> Result<(), SessionError> {
        self.station_command("kick-sta", macs).await
    }

    pub async fn block<S: AsRef<str>>(&self, macs: &[S]) -> Result<(), SessionError> {
        self.station_command("block-sta", macs).await
    }

    pub async fn unblock<S: AsRef<str>>(&self, macs: &[S]) -> Result<(), SessionError> {
        self.station_command("unblock-sta", macs).await
    }

    /// Remove the stations from the controller's client history
    ///
    /// Sent as a single command carrying every MAC.
    #[instrument(skip_all, fields(count = macs.len()))]
    pub async fn forget<S: AsRef<str>>(&self, macs: &[S]) -> Result<(), SessionError> {
        let macs = normalize_macs(macs)?;
        let payload = json!({ "cmd": "forget-sta", "macs": macs });
        self.command(STATION_MANAGER_PATH, Method::POST, &payload).await?;
        self.sinks.out(&format!("forget-sta {}", macs.join(", ")));
        Ok(())
    }

    /// Set a client's alias and fixed IP
    ///
    /// The user record is looked up by MAC in the full client list. An empty
    /// `ip` turns the fixed address off.
    #[instrument(skip(self))]
    pub async fn set_user_details(
        &self,
        mac: &str,
        name: &str,
        ip: &str,
    ) -> Result<(), SessionError> {
        let mac = normalize_mac(mac)?;
        let ip = ip.trim();
        if !ip.is_empty() && ip.parse::<IpAddr>().is_err() {
            return Err(EndpointValidationError::InvalidPayload {
                reason: format!("{ip:?} is not an IP address"),
            }
            .into());
        }

        let clients = self.get_all_clients().await?;
        let id = clients
            .into_iter()
            .find(|client| client.mac.eq_ignore_ascii_case(&mac))
            .and_then(|client| client.id)
            .ok_or_else(|| SessionError::UnknownClient { mac: mac.clone() })?;

        let payload = if ip.is_empty() {
            json!({ "name": name, "use_fixedip": false })
        } else {
            json!({ "name": name, "use_fixedip": true, "fixed_ip": ip })
        };
        self.command(&format!("{USER_REST_PATH}/{id}"), Method::PUT, &payload).await?;
        self.sinks.out(&format!("Updated {mac}: name {name:?}, fixed ip {ip:?}"));
        Ok(())
    }

    #[instrument(skip_all, fields(command = %command, count = macs.len()))]
    async fn station_command<S: AsRef<str>>(
        &self,
        command: &str,
        macs: &[S],
    ) -> Result<(), SessionError> {
        let macs = normalize_macs(macs)?;
        for mac in &macs {
            let payload = json!({ "cmd": command, "mac": mac });
            self.command(STATION_MANAGER_PATH, Method::POST, &payload).await?;
            self.sinks.out(&format!("{command} {mac}"));
        }
        Ok(())
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, SessionError> {
        let body = self.site_call(Method::GET, path, None).await?;
        decode_envelope(&body)
    }

    async fn command(&self, path: &str, method: Method, payload: &Value) -> Result<(), SessionError> {
        let body = self.site_call(method, path, Some(payload)).await?;
        decode_envelope::<Value>(&body)?;
        Ok(())
    }

    async fn site_call(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Value>,
    ) -> Result<String, SessionError> {
        self.path_validator.validate_path(path)?;
        let body = payload.map(serde_json::to_vec).transpose()?;
        let ctx = RequestContext::with_timeout(self.call_budget());
        self.dispatch(&ctx, method, path, body.as_deref()).await
    }
}
