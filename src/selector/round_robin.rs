//! 轮询选择器

use super::Selector;
use crate::types::ServiceEndpoint;
use std::sync::atomic::{AtomicUsize, Ordering};

/// 轮询选择器
///
/// 维护单调递增游标，对调用传入的快照取模。游标与集合大小都来自
/// 同一个快照切片，成员变更不会导致越界或跳号。
pub struct RoundRobinSelector {
    index: AtomicUsize,
}

impl RoundRobinSelector {
    pub fn new() -> Self {
        Self {
            index: AtomicUsize::new(0),
        }
    }
}

impl Default for RoundRobinSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl Selector for RoundRobinSelector {
    fn select<'a>(&self, endpoints: &'a [ServiceEndpoint]) -> Option<&'a ServiceEndpoint> {
        if endpoints.is_empty() {
            return None;
        }
        let index = self.index.fetch_add(1, Ordering::Relaxed);
        endpoints.get(index % endpoints.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints(n: usize) -> Vec<ServiceEndpoint> {
        (0..n)
            .map(|i| ServiceEndpoint::new("orders", format!("n{}", i), format!("127.0.0.1:{}", 50051 + i)))
            .collect()
    }

    #[test]
    fn n_selections_visit_each_endpoint_once() {
        let eps = endpoints(4);
        let selector = RoundRobinSelector::new();

        let first_cycle: Vec<&str> = (0..4)
            .map(|_| selector.select(&eps).unwrap().node_id.as_str())
            .collect();
        assert_eq!(first_cycle, vec!["n0", "n1", "n2", "n3"]);

        // 第 N+1 次从同一偏移重复整个循环
        let second_cycle: Vec<&str> = (0..4)
            .map(|_| selector.select(&eps).unwrap().node_id.as_str())
            .collect();
        assert_eq!(second_cycle, first_cycle);
    }

    #[test]
    fn empty_set_returns_none() {
        let selector = RoundRobinSelector::new();
        assert!(selector.select(&[]).is_none());
    }

    #[test]
    fn shrinking_set_stays_in_range() {
        let selector = RoundRobinSelector::new();
        let large = endpoints(8);
        for _ in 0..6 {
            selector.select(&large).unwrap();
        }
        // 游标超过新集合大小后仍取模回绕
        let small = endpoints(2);
        assert!(selector.select(&small).is_some());
    }
}
