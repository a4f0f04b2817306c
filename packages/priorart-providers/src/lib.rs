pub mod embedding;
pub mod scorer;

use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::{
	Client,
	header::{AUTHORIZATION, HeaderMap, HeaderName},
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Connection settings shared by every OpenAI-compatible call.
pub(crate) struct Endpoint<'a> {
	pub api_base: &'a str,
	pub path: &'a str,
	pub api_key: &'a str,
	pub default_headers: &'a Map<String, Value>,
	pub timeout_ms: u64,
}
impl Endpoint<'_> {
	/// POSTs `body` and decodes a 2xx JSON reply into `T`.
	pub(crate) async fn post<T>(&self, body: &Value) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let url = format!("{}{}", self.api_base, self.path);
		let res = http_client(self.timeout_ms)?
			.post(&url)
			.headers(auth_headers(self.api_key, self.default_headers)?)
			.json(body)
			.send()
			.await?;

		Ok(res.error_for_status()?.json::<T>().await?)
	}
}

pub fn auth_headers(api_key: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(eyre::eyre!("Default header {key:?} must be a string."));
		};

		if raw.trim().is_empty() {
			return Err(eyre::eyre!("Default header {key:?} must be non-empty."));
		}

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}

pub(crate) fn http_client(timeout_ms: u64) -> Result<Client> {
	Ok(Client::builder().timeout(Duration::from_millis(timeout_ms)).build()?)
}
