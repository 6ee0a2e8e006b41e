//! 随机选择器

use super::Selector;
use crate::types::ServiceEndpoint;
use rand::Rng;

/// 随机选择器，均匀选取，无内部状态
pub struct RandomSelector;

impl RandomSelector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RandomSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl Selector for RandomSelector {
    fn select<'a>(&self, endpoints: &'a [ServiceEndpoint]) -> Option<&'a ServiceEndpoint> {
        if endpoints.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..endpoints.len());
        endpoints.get(index)
    }
}
