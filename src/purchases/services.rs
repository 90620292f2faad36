use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{
    repo::PurchaseLedger,
    repo_types::{NewPurchase, Purchase, PurchaseWithItem},
};
use crate::{
    error::ServiceError,
    inventory::{repo_types::Item, services::InventoryService},
};

/// Writes and reads ledger entries. Prices are taken as given, never looked up.
#[derive(Clone)]
pub struct PurchaseRecorder {
    ledger: Arc<dyn PurchaseLedger>,
}

impl PurchaseRecorder {
    pub fn new(ledger: Arc<dyn PurchaseLedger>) -> Self {
        Self { ledger }
    }

    pub async fn record(&self, purchase: NewPurchase) -> Result<Purchase, ServiceError> {
        if purchase.quantity <= 0 {
            return Err(ServiceError::Validation("Valid quantity is required".into()));
        }
        if purchase.total_price < Decimal::ZERO {
            return Err(ServiceError::Validation("Total price must not be negative".into()));
        }
        let recorded = self.ledger.insert_purchase(Uuid::new_v4(), &purchase).await?;
        info!(
            purchase_id = %recorded.id,
            user_id = %recorded.user_id,
            sweet_id = %purchase.item_id,
            quantity = recorded.quantity,
            total_price = %recorded.total_price,
            "purchase recorded"
        );
        Ok(recorded)
    }

    pub async fn history_for(&self, user_id: Uuid) -> Result<Vec<PurchaseWithItem>, ServiceError> {
        Ok(self.ledger.purchases_for_user(user_id).await?)
    }
}

/// Outcome of a successful checkout.
#[derive(Debug, Clone)]
pub struct CheckoutReceipt {
    pub item: Item,
    pub purchase: Purchase,
}

/// Stock decrement followed by a ledger write, with a compensating restock
/// when the ledger write fails.
#[derive(Clone)]
pub struct Checkout {
    inventory: InventoryService,
    recorder: PurchaseRecorder,
}

impl Checkout {
    pub fn new(inventory: InventoryService, recorder: PurchaseRecorder) -> Self {
        Self {
            inventory,
            recorder,
        }
    }

    pub async fn checkout(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<Option<CheckoutReceipt>, ServiceError> {
        let Some(item) = self.inventory.purchase(item_id, quantity).await? else {
            return Ok(None);
        };

        // price as of the decrement, not as of any later read
        let total_price = item
            .price
            .checked_mul(Decimal::from(quantity))
            .ok_or_else(|| ServiceError::Validation("Total price is out of range".into()))?;

        let recorded = self
            .recorder
            .record(NewPurchase {
                user_id,
                item_id,
                quantity,
                total_price,
            })
            .await;

        match recorded {
            Ok(purchase) => Ok(Some(CheckoutReceipt { item, purchase })),
            Err(err) => {
                warn!(error = %err, %user_id, sweet_id = %item_id, quantity, "ledger write failed; returning stock");
                match self.inventory.restock(item_id, quantity).await {
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        warn!(sweet_id = %item_id, quantity, "sweet vanished before stock could be returned")
                    }
                    Err(comp) => error!(
                        error = %err,
                        compensation_error = %comp,
                        sweet_id = %item_id,
                        quantity,
                        "stock decremented without a ledger entry"
                    ),
                }
                Err(err)
            }
        }
    }
}
