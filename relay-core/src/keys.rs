use serde::{Deserialize, Serialize};

/// A subscriber's signing + encryption key material, base64-encoded. Private
/// fields must never leave the key-manager's storage surface except through the
/// signer step's `signing_private_key` lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyBundle {
    pub unique_key_id: String,
    pub signing_public: String,
    pub signing_private: String,
    pub encr_public: String,
    pub encr_private: String,
}

impl KeyBundle {
    pub fn public_only(&self) -> PublicKeyBundle {
        PublicKeyBundle {
            unique_key_id: self.unique_key_id.clone(),
            signing_public: self.signing_public.clone(),
            encr_public: self.encr_public.clone(),
        }
    }
}

/// The subset of a [`KeyBundle`] safe to hand to a registry or log line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicKeyBundle {
    pub unique_key_id: String,
    pub signing_public: String,
    pub encr_public: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_only_drops_private_material() {
        let bundle = KeyBundle {
            unique_key_id: "k1".into(),
            signing_public: "sp".into(),
            signing_private: "SECRET".into(),
            encr_public: "ep".into(),
            encr_private: "SECRET2".into(),
        };
        let public = serde_json::to_string(&bundle.public_only()).unwrap();
        assert!(!public.contains("SECRET"));
    }
}
