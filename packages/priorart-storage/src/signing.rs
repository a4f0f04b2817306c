//! Time-limited download links for stored reports.

use time::OffsetDateTime;

use crate::{Error, Result};

const KEY_CONTEXT: &str = "priorart report url v1";

#[derive(Clone)]
pub struct UrlSigner {
	key: [u8; 32],
}
impl UrlSigner {
	pub fn new(secret: &str) -> Self {
		Self { key: blake3::derive_key(KEY_CONTEXT, secret.as_bytes()) }
	}

	/// Hex signature over `key` and the unix expiry.
	pub fn sign(&self, object_key: &str, expires: i64) -> String {
		self.hash(object_key, expires).to_hex().to_string()
	}

	/// Returns the `(expires, signature)` pair for a link valid for `ttl_seconds` from `now`.
	pub fn sign_for(
		&self,
		object_key: &str,
		now: OffsetDateTime,
		ttl_seconds: u64,
	) -> (i64, String) {
		let ttl = i64::try_from(ttl_seconds).unwrap_or(i64::MAX);
		let expires = now.unix_timestamp().saturating_add(ttl);

		(expires, self.sign(object_key, expires))
	}

	pub fn verify(
		&self,
		object_key: &str,
		expires: i64,
		signature: &str,
		now: OffsetDateTime,
	) -> Result<()> {
		if now.unix_timestamp() > expires {
			return Err(Error::Signature("link has expired".to_string()));
		}

		let provided = blake3::Hash::from_hex(signature)
			.map_err(|_| Error::Signature("malformed signature".to_string()))?;

		// `blake3::Hash` equality is constant time.
		if provided != self.hash(object_key, expires) {
			return Err(Error::Signature("signature mismatch".to_string()));
		}

		Ok(())
	}

	fn hash(&self, object_key: &str, expires: i64) -> blake3::Hash {
		let message = format!("{object_key}\n{expires}");

		blake3::keyed_hash(&self.key, message.as_bytes())
	}
}
impl std::fmt::Debug for UrlSigner {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("UrlSigner").finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use time::Duration;

	use super::*;

	fn now() -> OffsetDateTime {
		OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("Valid timestamp.")
	}

	#[test]
	fn accepts_fresh_signature() {
		let signer = UrlSigner::new("secret");
		let (expires, signature) = signer.sign_for("job_report.csv", now(), 3_600);

		assert_eq!(expires, 1_700_003_600);
		assert!(signer.verify("job_report.csv", expires, &signature, now()).is_ok());
	}

	#[test]
	fn rejects_expired_link() {
		let signer = UrlSigner::new("secret");
		let (expires, signature) = signer.sign_for("job_report.csv", now(), 60);
		let later = now() + Duration::seconds(61);
		let err =
			signer.verify("job_report.csv", expires, &signature, later).expect_err("Expected expiry.");

		assert!(err.to_string().contains("expired"));
	}

	#[test]
	fn rejects_tampered_key_or_foreign_secret() {
		let signer = UrlSigner::new("secret");
		let (expires, signature) = signer.sign_for("a_report.csv", now(), 60);

		assert!(signer.verify("b_report.csv", expires, &signature, now()).is_err());
		assert!(signer.verify("a_report.csv", expires + 1, &signature, now()).is_err());

		let foreign = UrlSigner::new("other");

		assert!(foreign.verify("a_report.csv", expires, &signature, now()).is_err());
		assert!(signer.verify("a_report.csv", expires, "not-hex", now()).is_err());
	}
}
