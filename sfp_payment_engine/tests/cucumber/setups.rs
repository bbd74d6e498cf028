use cucumber::given;

use crate::cucumber::{store_world::ReconciliationSystem, StoreWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut StoreWorld) {
    let system = ReconciliationSystem::new().await;
    world.system = Some(system);
}
