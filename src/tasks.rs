//! Built-in tasks of the root application

use crate::app::Application;

/// Register `init` and `store` on the root application
pub fn register_builtins(base: &mut Application) {
    base.task("init", &[], |ctx| async move {
        let store = ctx
            .store
            .lock()
            .map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        store.save()?;
        log::info!("Initialized store '{}' at {}", store.name(), store.path().display());
        Ok::<(), anyhow::Error>(())
    });

    base.task("store", &[], |ctx| async move {
        let json = {
            let store = ctx
                .store
                .lock()
                .map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
            serde_json::to_string_pretty(store.data())?
        };
        println!("{}", json);
        Ok::<(), anyhow::Error>(())
    });
}
