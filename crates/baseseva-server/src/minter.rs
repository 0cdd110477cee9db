//! Certificate minting boundary.
//!
//! No chain is contacted. [`SimulatedMinter`] fabricates a token id and a
//! transaction hash, and every receipt it returns says so.

use async_trait::async_trait;
use baseseva_shared::{timestamp_now, MintCertificateRequest, MintReceipt};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::ServerError;

#[async_trait]
pub trait CertificateMinter: Send + Sync {
    async fn mint(&self, request: &MintCertificateRequest) -> Result<MintReceipt, ServerError>;
}

pub struct SimulatedMinter {
    network: String,
}

impl SimulatedMinter {
    pub fn new(network: impl Into<String>) -> Self {
        Self {
            network: network.into(),
        }
    }
}

#[async_trait]
impl CertificateMinter for SimulatedMinter {
    async fn mint(&self, request: &MintCertificateRequest) -> Result<MintReceipt, ServerError> {
        let mut hash = [0u8; 32];
        OsRng.fill_bytes(&mut hash);
        let token_id = (OsRng.next_u64() >> 1).to_string();

        tracing::info!(
            donation = %request.donation_id,
            token_id = %token_id,
            network = %self.network,
            "Simulated certificate mint"
        );

        Ok(MintReceipt {
            donation_id: request.donation_id,
            token_id,
            transaction_hash: format!("0x{}", hex::encode(hash)),
            network: self.network.clone(),
            certificate_url: request.certificate_url.clone(),
            minted_at: timestamp_now(),
            simulated: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use baseseva_shared::BloodType;
    use chrono::Utc;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_receipt_shape() {
        let minter = SimulatedMinter::new("simulated");
        let request = MintCertificateRequest {
            donation_id: Uuid::new_v4(),
            wallet_address: "0xabc".into(),
            blood_type: BloodType::APositive,
            donation_date: Utc::now(),
            certificate_url: Some("http://x/files/a.png".into()),
        };

        let a = minter.mint(&request).await.unwrap();
        let b = minter.mint(&request).await.unwrap();

        assert!(a.simulated);
        assert_eq!(a.donation_id, request.donation_id);
        assert_eq!(a.transaction_hash.len(), 66);
        assert!(a.transaction_hash.starts_with("0x"));
        assert!(a.token_id.parse::<u64>().is_ok());
        assert_ne!(a.transaction_hash, b.transaction_hash);
    }
}
