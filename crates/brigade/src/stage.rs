//! The three pipeline stages.
//!
//! Each stage is split into the work it does on a record ([`Pipeline::take_order`],
//! [`Pipeline::cook`], [`Pipeline::serve`]), which picks workers and emits the
//! stage's [`Event`], and the channel plumbing around it. The blocking
//! functions here ([`intake`], [`process`], [`deliver`]) do the plumbing for the
//! thread runtime; the async runtime wraps the same work.

use crate::{
    Channel, CompletionRecord, Error, Event, IntakeRecord, Observer, OrderIndex, Pipeline,
    RandSource, Rendezvous, Result, Stage,
};

impl<R, O> Pipeline<R, O>
where
    R: RandSource,
    O: Observer,
{
    /// A waiter takes `order` and tickets it for a chef. Only the chef
    /// travels with the ticket.
    pub fn take_order(&self, order: OrderIndex) -> IntakeRecord {
        let chef = self.chefs().select(self.rand());
        let waiter = self.waiters().select(self.rand());
        self.observer().observe(Event::Intake {
            order,
            waiter,
            chef: chef.clone(),
        });
        IntakeRecord { chef, order }
    }

    /// The ticketed chef cooks the order.
    pub fn cook(&self, ticket: IntakeRecord) -> CompletionRecord {
        self.observer().observe(Event::Process {
            order: ticket.order,
            chef: ticket.chef.clone(),
        });
        CompletionRecord::from(ticket)
    }

    /// A waiter brings the dish out.
    pub fn serve(&self, dish: CompletionRecord) {
        let waiter = self.waiters().select(self.rand());
        self.observer().observe(Event::Deliver {
            order: dish.order,
            waiter,
            chef: dish.chef,
        });
    }
}

/// Intake stage: tickets `order` and hands it to a process task, blocking
/// until one takes it.
///
/// # Errors
///
/// Returns [`Error::ChannelClosed`] if `tickets` was closed early.
pub fn intake<R, O>(
    pipeline: &Pipeline<R, O>,
    order: OrderIndex,
    tickets: &Rendezvous<IntakeRecord>,
) -> Result<()>
where
    R: RandSource,
    O: Observer,
{
    let ticket = pipeline.take_order(order);
    tickets.send(ticket, Stage::Intake)
}

/// Process stage: takes whichever ticket is next, cooks it and hands the dish
/// to a deliver task.
///
/// # Errors
///
/// Returns [`Error::Drained`] if `tickets` closed before a ticket arrived
/// and [`Error::ChannelClosed`] if `pass` was closed early.
pub fn process<R, O>(
    pipeline: &Pipeline<R, O>,
    tickets: &Rendezvous<IntakeRecord>,
    pass: &Rendezvous<CompletionRecord>,
) -> Result<()>
where
    R: RandSource,
    O: Observer,
{
    let ticket = tickets.recv().ok_or(Error::Drained {
        channel: Channel::Tickets,
        stage: Stage::Process,
    })?;
    let dish = pipeline.cook(ticket);
    pass.send(dish, Stage::Process)
}

/// Deliver stage: takes whichever dish is next and serves it.
///
/// # Errors
///
/// Returns [`Error::Drained`] if `pass` closed before a dish arrived.
pub fn deliver<R, O>(pipeline: &Pipeline<R, O>, pass: &Rendezvous<CompletionRecord>) -> Result<()>
where
    R: RandSource,
    O: Observer,
{
    let dish = pass.recv().ok_or(Error::Drained {
        channel: Channel::Pass,
        stage: Stage::Deliver,
    })?;
    pipeline.serve(dish);
    Ok(())
}
