//! Test fixtures for lifecycle testing.

use std::sync::Arc;

use crate::config::Config;
use crate::provider::{OsType, ProviderClient, SourceImage};
use crate::state::StateBag;
use crate::ui::CollectingUi;

/// A 20 GB Linux image.
#[must_use]
pub fn linux_image() -> SourceImage {
    SourceImage {
        image_id: "uimage-test".to_string(),
        os_type: OsType::Linux,
        image_size_gb: 20,
    }
}

/// A valid configuration in `cn-bj2`.
#[must_use]
pub fn test_config() -> Config {
    Config::new("cn-bj2", "cn-bj2-02", "n-basic-2", "uimage-test").with_instance_name("packer-test")
}

/// Builds a state bag around `client` with a collecting UI.
#[must_use]
pub fn state_with(
    client: Arc<dyn ProviderClient>,
    config: Config,
    image: SourceImage,
) -> (StateBag, Arc<CollectingUi>) {
    let ui = Arc::new(CollectingUi::new());
    let state = StateBag::new(client, ui.clone(), config, image);
    (state, ui)
}

/// Builds a state bag with [`test_config`] and [`linux_image`].
#[must_use]
pub fn test_state(client: Arc<dyn ProviderClient>) -> (StateBag, Arc<CollectingUi>) {
    state_with(client, test_config(), linux_image())
}
