// znr - zone notes report for the DynECT DNS API
// Copyright (C) 2024 Mathias Uhl <mathiasuhl@gmx.de>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Authenticated session lifetime.
//!
//! A [`Session`] exists only after a successful login and logs out when it
//! is dropped, so every exit path after login closes the server-side
//! session.

use crate::client::{ApiMessage, DynClient, describe_messages};
use crate::config::Credentials;
use anyhow::Result;
use reqwest::Method;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const SESSION_PATH: &str = "/REST/Session/";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("incorrect credentials (status `{status}`){}", describe_messages(.messages))]
    Login {
        status: String,
        messages: Vec<ApiMessage>,
    },
    #[error("login succeeded but the response carried no session token")]
    MissingToken,
}

pub struct Session<'a> {
    client: &'a mut DynClient,
    open: bool,
}

impl<'a> Session<'a> {
    pub fn login(client: &'a mut DynClient, credentials: &Credentials) -> Result<Self> {
        let params = json!({
            "customer_name": credentials.customer,
            "user_name": credentials.user,
            "password": credentials.password,
        });

        let response = client.execute(Method::POST, SESSION_PATH, Some(&params))?;
        if !response.is_success() {
            return Err(SessionError::Login {
                status: response.status,
                messages: response.msgs,
            }
            .into());
        }

        let token = response
            .data
            .get("token")
            .and_then(|t| t.as_str())
            .ok_or(SessionError::MissingToken)?;
        client.set_token(Some(token.to_string()));
        info!(customer = %credentials.customer, user = %credentials.user, "logged in");

        Ok(Self { client, open: true })
    }

    pub fn client(&self) -> &DynClient {
        self.client
    }

    /// Ends the session now instead of at drop.
    pub fn logout(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        if self.client.token().is_none() {
            return;
        }

        match self.client.execute(Method::DELETE, SESSION_PATH, None) {
            Ok(response) if response.is_success() => debug!("logged out"),
            Ok(response) => warn!(
                status = %response.status,
                "logout was not acknowledged{}",
                describe_messages(&response.msgs)
            ),
            Err(err) => warn!("logout failed: {err:#}"),
        }
        self.client.set_token(None);
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.close();
    }
}
