use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    PaymentCapturedEvent,
    PayoutCompletedEvent,
    PayoutFailedEvent,
};

/// The producer sets the API objects publish into. Orchestrators call every producer registered
/// for an event after the corresponding database transaction commits.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub payment_captured_producer: Vec<EventProducer<PaymentCapturedEvent>>,
    pub payout_completed_producer: Vec<EventProducer<PayoutCompletedEvent>>,
    pub payout_failed_producer: Vec<EventProducer<PayoutFailedEvent>>,
}

/// One handler per event type, built from the hooks the embedding application provides.
pub struct EventHandlers {
    pub on_payment_captured: Option<EventHandler<PaymentCapturedEvent>>,
    pub on_payout_completed: Option<EventHandler<PayoutCompletedEvent>>,
    pub on_payout_failed: Option<EventHandler<PayoutFailedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_payment_captured = hooks.on_payment_captured.map(|f| EventHandler::new(buffer_size, f));
        let on_payout_completed = hooks.on_payout_completed.map(|f| EventHandler::new(buffer_size, f));
        let on_payout_failed = hooks.on_payout_failed.map(|f| EventHandler::new(buffer_size, f));
        Self { on_payment_captured, on_payout_completed, on_payout_failed }
    }

    /// Builds the producer set to hand to the API objects.
    pub fn producers(&self) -> EventProducers {
        let mut producers = EventProducers::default();
        if let Some(h) = &self.on_payment_captured {
            producers.payment_captured_producer.push(h.subscribe());
        }
        if let Some(h) = &self.on_payout_completed {
            producers.payout_completed_producer.push(h.subscribe());
        }
        if let Some(h) = &self.on_payout_failed {
            producers.payout_failed_producer.push(h.subscribe());
        }
        producers
    }

    /// Consumes the handlers, spawning one task per configured hook.
    pub fn start(self) {
        if let Some(h) = self.on_payment_captured {
            tokio::spawn(h.start_handler());
        }
        if let Some(h) = self.on_payout_completed {
            tokio::spawn(h.start_handler());
        }
        if let Some(h) = self.on_payout_failed {
            tokio::spawn(h.start_handler());
        }
    }
}

/// Async callbacks the embedding application registers for settlement events.
#[derive(Default)]
pub struct EventHooks {
    pub on_payment_captured: Option<Handler<PaymentCapturedEvent>>,
    pub on_payout_completed: Option<Handler<PayoutCompletedEvent>>,
    pub on_payout_failed: Option<Handler<PayoutFailedEvent>>,
}

impl EventHooks {
    pub fn on_payment_captured<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(PaymentCapturedEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_payment_captured = Some(wrap(f));
        self
    }

    pub fn on_payout_completed<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(PayoutCompletedEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_payout_completed = Some(wrap(f));
        self
    }

    pub fn on_payout_failed<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(PayoutFailedEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_payout_failed = Some(wrap(f));
        self
    }
}

fn wrap<E, F, Fut>(f: F) -> Handler<E>
where
    F: Fn(E) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |event| Box::pin(f(event)) as Pin<Box<dyn Future<Output = ()> + Send>>)
}
