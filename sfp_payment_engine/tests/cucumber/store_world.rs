use cucumber::World;
use log::*;
use sfp_payment_engine::{
    events::EventProducers,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    OrderFlowApi,
    PaymentGatewayError,
    RefundApi,
    SqliteDatabase,
};

#[derive(Default, Debug, World)]
pub struct StoreWorld {
    pub system: Option<ReconciliationSystem>,
    pub last_error: Option<PaymentGatewayError>,
    pub last_refund_id: Option<i64>,
}

#[derive(Debug)]
pub struct ReconciliationSystem {
    pub db_path: String,
    pub orders: OrderFlowApi<SqliteDatabase>,
    pub refunds: RefundApi<SqliteDatabase>,
}

impl StoreWorld {
    pub fn system(&self) -> &ReconciliationSystem {
        self.system.as_ref().expect("System not initialised")
    }

    pub fn orders(&self) -> &OrderFlowApi<SqliteDatabase> {
        &self.system().orders
    }

    pub fn refunds(&self) -> &RefundApi<SqliteDatabase> {
        &self.system().refunds
    }

    /// Keeps the error so that a later step can assert on it.
    pub fn record<T>(&mut self, result: Result<T, PaymentGatewayError>) -> Option<T> {
        match result {
            Ok(v) => {
                self.last_error = None;
                Some(v)
            },
            Err(e) => {
                debug!("🥒️ Step failed with {e}");
                self.last_error = Some(e);
                None
            },
        }
    }
}

impl ReconciliationSystem {
    pub async fn new() -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 1).await.expect("Error creating connection to database");
        debug!("Created database: {url}");
        let producers = EventProducers::default();
        let orders = OrderFlowApi::new(db.clone(), producers.clone());
        let refunds = RefundApi::new(db, producers);
        Self { db_path: url, orders, refunds }
    }
}
