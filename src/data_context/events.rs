//! 数据上下文事件
//! 变更、提交前、提交后三类事件及其订阅

use std::cell::Cell;

use crate::models::entity::EntityKey;

use super::EntitySet;

/// 实体变更事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub entity: EntityKey,
}

/// 提交前事件，监听器可以阻止提交
#[derive(Debug)]
pub struct PreCommitEvent {
    pub modified: Vec<EntityKey>,
    pub removed: Vec<EntityKey>,
    prevented: Cell<bool>,
}

impl PreCommitEvent {
    pub(crate) fn new(modified: Vec<EntityKey>, removed: Vec<EntityKey>) -> Self {
        Self {
            modified,
            removed,
            prevented: Cell::new(false),
        }
    }

    pub fn prevent_commit(&self) {
        self.prevented.set(true);
    }

    pub fn is_commit_prevented(&self) -> bool {
        self.prevented.get()
    }
}

/// 提交后事件
#[derive(Debug, Clone)]
pub struct PostCommitEvent {
    pub committed: EntitySet,
}

/// Handle returned by the `add_*_listener` methods; pass it back to
/// [`DataContext::unsubscribe`](super::DataContext::unsubscribe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

type Listener<E> = Box<dyn FnMut(&E)>;

struct Listeners<E> {
    entries: Vec<(Subscription, Listener<E>)>,
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<E> Listeners<E> {
    fn push(&mut self, subscription: Subscription, listener: Listener<E>) {
        self.entries.push((subscription, listener));
    }

    fn remove(&mut self, subscription: Subscription) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(s, _)| *s != subscription);
        self.entries.len() != before
    }

    fn fire(&mut self, event: &E) {
        for (_, listener) in self.entries.iter_mut() {
            listener(event);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// 事件中心
#[derive(Default)]
pub(crate) struct EventHub {
    next_id: u64,
    change: Listeners<ChangeEvent>,
    pre_commit: Listeners<PreCommitEvent>,
    post_commit: Listeners<PostCommitEvent>,
}

impl EventHub {
    fn next_subscription(&mut self) -> Subscription {
        self.next_id += 1;
        Subscription(self.next_id)
    }

    pub(crate) fn subscribe_change(&mut self, listener: impl FnMut(&ChangeEvent) + 'static) -> Subscription {
        let subscription = self.next_subscription();
        self.change.push(subscription, Box::new(listener));
        subscription
    }

    pub(crate) fn subscribe_pre_commit(&mut self, listener: impl FnMut(&PreCommitEvent) + 'static) -> Subscription {
        let subscription = self.next_subscription();
        self.pre_commit.push(subscription, Box::new(listener));
        subscription
    }

    pub(crate) fn subscribe_post_commit(
        &mut self,
        listener: impl FnMut(&PostCommitEvent) + 'static,
    ) -> Subscription {
        let subscription = self.next_subscription();
        self.post_commit.push(subscription, Box::new(listener));
        subscription
    }

    /// 取消订阅，返回是否找到对应的监听器
    pub(crate) fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        self.change.remove(subscription)
            || self.pre_commit.remove(subscription)
            || self.post_commit.remove(subscription)
    }

    pub(crate) fn publish_change(&mut self, event: &ChangeEvent) {
        self.change.fire(event);
    }

    pub(crate) fn publish_pre_commit(&mut self, event: &PreCommitEvent) {
        self.pre_commit.fire(event);
    }

    pub(crate) fn publish_post_commit(&mut self, event: &PostCommitEvent) {
        self.post_commit.fire(event);
    }

    #[cfg(test)]
    pub(crate) fn listener_count(&self) -> usize {
        self.change.len() + self.pre_commit.len() + self.post_commit.len()
    }
}
