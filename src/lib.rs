#![doc(test(attr(deny(warnings))))]

//! Tally is a command-line billing tool for freelancers: it tracks time against
//! clients and contracts and reconciles unbilled time into invoices.

pub mod cli;
pub mod utils;

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::info!("Tally tracing initialized.");
    });
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_does_not_panic() {
        super::init();
        super::init();
    }
}
