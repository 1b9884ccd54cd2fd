//! In-process broker with AMQP-style routing.
//!
//! Supports direct and topic exchanges (`*` matches one word, `#` zero or
//! more), the default exchange, FIFO queues shared by competing subscribers,
//! delivery counting and dead-letter routing. Used by tests and by local runs
//! that have no Kafka cluster.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::config::{BrokerTopology, DEFAULT_MAX_DELIVERY_ATTEMPTS};
use crate::errors::BrokerError;
use crate::transport::{
    BrokerTransport, Delivery, RejectDisposition, Subscription, DEFAULT_EXCHANGE,
};

/// How an exchange matches routing keys against binding patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    /// Exact routing key match.
    Direct,
    /// Dot-separated words with `*` and `#` wildcards.
    Topic,
}

#[derive(Clone)]
struct Message {
    payload: Bytes,
    routing_key: String,
    deliveries: u32,
}

#[derive(Clone)]
struct DeadLetter {
    exchange: String,
    routing_key: String,
}

#[derive(Default)]
struct Queue {
    ready: VecDeque<Message>,
    dead_letter: Option<DeadLetter>,
}

#[derive(PartialEq)]
struct Binding {
    exchange: String,
    pattern: String,
    queue: String,
}

struct InFlight {
    queue: String,
    subscriber: u64,
    message: Message,
}

struct State {
    exchanges: HashMap<String, ExchangeKind>,
    queues: HashMap<String, Queue>,
    bindings: Vec<Binding>,
    in_flight: HashMap<u64, InFlight>,
    next_tag: u64,
    next_subscriber: u64,
    max_delivery_attempts: u32,
    closed: bool,
}

impl State {
    fn route(
        &mut self,
        exchange: &str,
        routing_key: &str,
        message: Message,
    ) -> Result<usize, BrokerError> {
        if exchange == DEFAULT_EXCHANGE {
            return Ok(match self.queues.get_mut(routing_key) {
                Some(queue) => {
                    queue.ready.push_back(message);
                    1
                }
                None => 0,
            });
        }

        let kind = *self
            .exchanges
            .get(exchange)
            .ok_or_else(|| BrokerError::UnknownExchange(exchange.to_string()))?;

        let targets: Vec<String> = self
            .bindings
            .iter()
            .filter(|b| b.exchange == exchange)
            .filter(|b| match kind {
                ExchangeKind::Direct => b.pattern == routing_key,
                ExchangeKind::Topic => topic_matches(&b.pattern, routing_key),
            })
            .map(|b| b.queue.clone())
            .collect();

        let mut routed = 0;
        for target in targets {
            if let Some(queue) = self.queues.get_mut(&target) {
                queue.ready.push_back(message.clone());
                routed += 1;
            }
        }
        Ok(routed)
    }

    fn take_next(&mut self, queue_name: &str, subscriber: u64) -> Option<Delivery> {
        let queue = self.queues.get_mut(queue_name)?;
        let mut message = queue.ready.pop_front()?;
        message.deliveries += 1;

        self.next_tag += 1;
        let tag = self.next_tag;
        let delivery = Delivery {
            tag,
            payload: message.payload.clone(),
            routing_key: message.routing_key.clone(),
            delivery_count: message.deliveries,
        };
        self.in_flight.insert(
            tag,
            InFlight {
                queue: queue_name.to_string(),
                subscriber,
                message,
            },
        );
        Some(delivery)
    }

    /// Put every unsettled delivery of a subscriber back at the head of its
    /// queue, oldest first. Delivery counts are kept.
    fn release(&mut self, subscriber: u64) -> usize {
        let mut tags: Vec<u64> = self
            .in_flight
            .iter()
            .filter(|(_, f)| f.subscriber == subscriber)
            .map(|(tag, _)| *tag)
            .collect();
        tags.sort_unstable_by(|a, b| b.cmp(a));

        for tag in &tags {
            if let Some(in_flight) = self.in_flight.remove(tag) {
                if let Some(queue) = self.queues.get_mut(&in_flight.queue) {
                    queue.ready.push_front(in_flight.message);
                }
            }
        }
        tags.len()
    }

    fn dead_letter(&mut self, queue_name: &str, mut message: Message) -> RejectDisposition {
        let Some(target) = self
            .queues
            .get(queue_name)
            .and_then(|q| q.dead_letter.clone())
        else {
            return RejectDisposition::Discarded;
        };

        message.deliveries = 0;
        message.routing_key = target.routing_key.clone();
        match self.route(&target.exchange, &target.routing_key, message) {
            Ok(routed) if routed > 0 => RejectDisposition::DeadLettered,
            Ok(_) => {
                warn!(
                    queue = %queue_name,
                    exchange = %target.exchange,
                    "Dead letter exchange has no bound queue, message discarded"
                );
                RejectDisposition::Discarded
            }
            Err(e) => {
                warn!(queue = %queue_name, error = %e, "Dead-lettering failed, message discarded");
                RejectDisposition::Discarded
            }
        }
    }
}

struct Inner {
    state: Mutex<State>,
    notify: Notify,
}

/// In-memory broker. Clones share the same exchanges and queues.
#[derive(Clone)]
pub struct InMemoryBroker {
    inner: Arc<Inner>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    exchanges: HashMap::new(),
                    queues: HashMap::new(),
                    bindings: Vec::new(),
                    in_flight: HashMap::new(),
                    next_tag: 0,
                    next_subscriber: 0,
                    max_delivery_attempts: DEFAULT_MAX_DELIVERY_ATTEMPTS,
                    closed: false,
                }),
                notify: Notify::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Declare an exchange. Redeclaring keeps the original kind.
    pub fn declare_exchange(&self, name: &str, kind: ExchangeKind) {
        self.lock()
            .exchanges
            .entry(name.to_string())
            .or_insert(kind);
    }

    /// Declare a queue, optionally dead-lettering to `(exchange, routing_key)`.
    ///
    /// Redeclaring an existing queue keeps its messages and arguments.
    pub fn declare_queue(&self, name: &str, dead_letter: Option<(&str, &str)>) {
        self.lock()
            .queues
            .entry(name.to_string())
            .or_insert_with(|| Queue {
                ready: VecDeque::new(),
                dead_letter: dead_letter.map(|(exchange, routing_key)| DeadLetter {
                    exchange: exchange.to_string(),
                    routing_key: routing_key.to_string(),
                }),
            });
    }

    /// Bind a queue to an exchange with a routing pattern.
    pub fn bind_queue(&self, queue: &str, exchange: &str, pattern: &str) -> Result<(), BrokerError> {
        let mut state = self.lock();
        if !state.queues.contains_key(queue) {
            return Err(BrokerError::UnknownQueue(queue.to_string()));
        }
        if !state.exchanges.contains_key(exchange) {
            return Err(BrokerError::UnknownExchange(exchange.to_string()));
        }

        let binding = Binding {
            exchange: exchange.to_string(),
            pattern: pattern.to_string(),
            queue: queue.to_string(),
        };
        if !state.bindings.contains(&binding) {
            state.bindings.push(binding);
        }
        Ok(())
    }

    /// Override the number of deliveries before a requeued message is dead-lettered.
    pub fn set_max_delivery_attempts(&self, attempts: u32) {
        self.lock().max_delivery_attempts = attempts.max(1);
    }

    /// Number of messages waiting in a queue, excluding in-flight deliveries.
    pub fn queue_depth(&self, queue: &str) -> usize {
        self.lock().queues.get(queue).map_or(0, |q| q.ready.len())
    }

    /// Number of deliveries handed out and not yet acked or rejected.
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight.len()
    }

    /// Remove and return the payloads waiting in a queue.
    pub fn drain(&self, queue: &str) -> Vec<Bytes> {
        self.lock()
            .queues
            .get_mut(queue)
            .map(|q| q.ready.drain(..).map(|m| m.payload).collect())
            .unwrap_or_default()
    }

    /// Close the broker; pending and future `next()` calls return `None`.
    pub fn close(&self) {
        self.lock().closed = true;
        self.inner.notify.notify_waiters();
    }
}

#[async_trait]
impl BrokerTransport for InMemoryBroker {
    async fn declare_topology(&self, topology: &BrokerTopology) -> Result<(), BrokerError> {
        let dead_letter_key = topology.dead_letter_routing_key();

        self.declare_exchange(&topology.exchange, ExchangeKind::Topic);
        self.declare_exchange(&topology.dead_letter_exchange, ExchangeKind::Direct);

        self.declare_queue(&topology.dead_letter_queue, None);
        self.bind_queue(
            &topology.dead_letter_queue,
            &topology.dead_letter_exchange,
            &dead_letter_key,
        )?;

        self.declare_queue(
            &topology.upload_queue,
            Some((&topology.dead_letter_exchange, &dead_letter_key)),
        );
        self.bind_queue(
            &topology.upload_queue,
            &topology.exchange,
            &topology.routing_key,
        )?;

        self.declare_queue(&topology.summary_queue, None);
        self.set_max_delivery_attempts(topology.max_delivery_attempts);

        debug!(
            exchange = %topology.exchange,
            upload_queue = %topology.upload_queue,
            dead_letter_queue = %topology.dead_letter_queue,
            summary_queue = %topology.summary_queue,
            "Declared in-memory topology"
        );
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: Bytes,
    ) -> Result<(), BrokerError> {
        let routed = {
            let mut state = self.lock();
            if state.closed {
                return Err(BrokerError::Closed);
            }
            state.route(
                exchange,
                routing_key,
                Message {
                    payload,
                    routing_key: routing_key.to_string(),
                    deliveries: 0,
                },
            )?
        };

        if routed == 0 {
            debug!(exchange = %exchange, routing_key = %routing_key, "Message unroutable, dropped");
        }
        self.inner.notify.notify_waiters();
        Ok(())
    }

    async fn subscribe(&self, queue: &str) -> Result<Box<dyn Subscription>, BrokerError> {
        let id = {
            let mut state = self.lock();
            if !state.queues.contains_key(queue) {
                return Err(BrokerError::UnknownQueue(queue.to_string()));
            }
            state.next_subscriber += 1;
            state.next_subscriber
        };
        Ok(Box::new(MemorySubscription {
            broker: self.clone(),
            queue: queue.to_string(),
            id,
        }))
    }
}

struct MemorySubscription {
    broker: InMemoryBroker,
    queue: String,
    id: u64,
}

impl Drop for MemorySubscription {
    /// A consumer that goes away without settling its deliveries gets them
    /// redelivered to the remaining or next subscriber.
    fn drop(&mut self) {
        let released = self.broker.lock().release(self.id);
        if released > 0 {
            debug!(queue = %self.queue, released, "Requeued unsettled deliveries");
            self.broker.inner.notify.notify_waiters();
        }
    }
}

#[async_trait]
impl Subscription for MemorySubscription {
    async fn next(&mut self) -> Option<Delivery> {
        loop {
            // Registered before checking so a publish in between is not missed
            let notified = self.broker.inner.notify.notified();
            {
                let mut state = self.broker.lock();
                if state.closed {
                    return None;
                }
                if let Some(delivery) = state.take_next(&self.queue, self.id) {
                    return Some(delivery);
                }
            }
            notified.await;
        }
    }

    async fn ack(&mut self, delivery: &Delivery) -> Result<(), BrokerError> {
        self.broker
            .lock()
            .in_flight
            .remove(&delivery.tag)
            .map(|_| ())
            .ok_or(BrokerError::UnknownDelivery(delivery.tag))
    }

    async fn reject(
        &mut self,
        delivery: &Delivery,
        requeue: bool,
    ) -> Result<RejectDisposition, BrokerError> {
        let disposition = {
            let mut state = self.broker.lock();
            let in_flight = state
                .in_flight
                .remove(&delivery.tag)
                .ok_or(BrokerError::UnknownDelivery(delivery.tag))?;

            if requeue && in_flight.message.deliveries < state.max_delivery_attempts {
                if let Some(queue) = state.queues.get_mut(&in_flight.queue) {
                    queue.ready.push_front(in_flight.message);
                }
                RejectDisposition::Requeued
            } else {
                state.dead_letter(&in_flight.queue, in_flight.message)
            }
        };

        self.broker.inner.notify.notify_waiters();
        Ok(disposition)
    }
}

/// Match a routing key against a topic pattern.
fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    words_match(&pattern, &key)
}

fn words_match(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => (0..=key.len()).any(|skip| words_match(rest, &key[skip..])),
        Some((&"*", rest)) => !key.is_empty() && words_match(rest, &key[1..]),
        Some((word, rest)) => key.first() == Some(word) && words_match(rest, &key[1..]),
    }
}
