use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use crate::{client::FeishuClient, config::FeishuAccountConfig};

/// Shared account state map.
pub type AccountStateMap = Arc<RwLock<HashMap<String, AccountState>>>;

/// Per-account runtime state.
pub struct AccountState {
    pub account_id: String,
    pub config: FeishuAccountConfig,
    pub client: Arc<FeishuClient>,
}
