//! UI-affine execution context.
//!
//! Project state lives on one thread. Worker threads never touch it directly:
//! they post a [`Continuation`] value back, and the owning thread runs the
//! registered closure the next time it pumps the queue.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::rc::Rc;
use std::thread::{self, Thread, ThreadId};
use std::time::{Duration, Instant};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

type Job = Box<dyn FnOnce() + Send>;
type Resume = Box<dyn FnOnce(Box<dyn Any + Send>)>;

enum Message {
  Run(Job),
  Resume(u64, Box<dyn Any + Send>),
  Cancel(u64),
}

/// Sends to the queue and wakes the owner if it is waiting in [`UiContext::pump_until`].
#[derive(Clone)]
struct Mailbox {
  sender: UnboundedSender<Message>,
  owner: Thread,
}

impl Mailbox {
  fn send(&self, message: Message) -> bool {
    let sent = self.sender.send(message).is_ok();
    if sent {
      self.owner.unpark();
    }
    sent
  }
}

/// The queue owned by the UI thread.
///
/// Not `Send`: it stays on the thread that created it.
pub struct UiContext {
  mailbox: Mailbox,
  receiver: RefCell<UnboundedReceiver<Message>>,
  pending: RefCell<HashMap<u64, Resume>>,
  next_id: Cell<u64>,
  _not_send: PhantomData<Rc<()>>,
}

impl Default for UiContext {
  fn default() -> Self {
    Self::new()
  }
}

impl UiContext {
  /// Create a context owned by the current thread.
  pub fn new() -> Self {
    let (sender, receiver) = mpsc::unbounded_channel();
    Self {
      mailbox: Mailbox {
        sender,
        owner: thread::current(),
      },
      receiver: RefCell::new(receiver),
      pending: RefCell::new(HashMap::new()),
      next_id: Cell::new(1),
      _not_send: PhantomData,
    }
  }

  /// A sendable handle for posting jobs from any thread.
  pub fn handle(&self) -> UiHandle {
    UiHandle {
      mailbox: self.mailbox.clone(),
    }
  }

  pub fn is_ui_thread(&self) -> bool {
    thread::current().id() == self.owner()
  }

  fn owner(&self) -> ThreadId {
    self.mailbox.owner.id()
  }

  /// Register `f` to run on this thread once a value is posted to the returned continuation.
  ///
  /// If the continuation is dropped without posting, `f` is discarded.
  pub fn continuation<T, F>(&self, f: F) -> Continuation<T>
  where
    T: Send + 'static,
    F: FnOnce(T) + 'static,
  {
    let id = self.next_id.get();
    self.next_id.set(id + 1);

    let resume: Resume = Box::new(move |value| match value.downcast::<T>() {
      Ok(value) => f(*value),
      Err(_) => warn!(id, "continuation received a value of the wrong type"),
    });
    self.pending.borrow_mut().insert(id, resume);

    Continuation {
      id,
      mailbox: Some(self.mailbox.clone()),
      _value: PhantomData,
    }
  }

  /// Number of continuations still waiting for a value.
  pub fn pending_continuations(&self) -> usize {
    self.pending.borrow().len()
  }

  /// Run every job queued so far. Returns how many ran.
  pub fn pump(&self) -> usize {
    let mut ran = 0;
    // The receiver borrow ends before dispatch: jobs may pump again.
    while let Some(message) = self.next_message() {
      ran += usize::from(self.dispatch(message));
    }
    ran
  }

  fn next_message(&self) -> Option<Message> {
    self.receiver.borrow_mut().try_recv().ok()
  }

  /// Run queued jobs until `done` holds or `timeout` elapses.
  ///
  /// Returns whether `done` held.
  pub fn pump_until(&self, mut done: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
      self.pump();
      if done() {
        return true;
      }
      let remaining = deadline.saturating_duration_since(Instant::now());
      if remaining.is_zero() {
        return false;
      }
      // Senders unpark this thread; a wake that arrived before parking is not lost.
      thread::park_timeout(remaining);
    }
  }

  fn dispatch(&self, message: Message) -> bool {
    match message {
      Message::Run(job) => {
        job();
        true
      }
      Message::Resume(id, value) => {
        // Released before running: the closure may register new continuations.
        let resume = self.pending.borrow_mut().remove(&id);
        match resume {
          Some(resume) => {
            resume(value);
            true
          }
          None => {
            warn!(id, "no continuation registered");
            false
          }
        }
      }
      Message::Cancel(id) => {
        if self.pending.borrow_mut().remove(&id).is_some() {
          debug!(id, "continuation dropped without a value");
        }
        false
      }
    }
  }
}

/// Posts work to a [`UiContext`] from any thread.
#[derive(Clone)]
pub struct UiHandle {
  mailbox: Mailbox,
}

impl UiHandle {
  pub fn is_ui_thread(&self) -> bool {
    thread::current().id() == self.mailbox.owner.id()
  }

  /// Queue `job` for the UI thread. Returns false once the context is gone.
  pub fn post(&self, job: impl FnOnce() + Send + 'static) -> bool {
    self.mailbox.send(Message::Run(Box::new(job)))
  }
}

/// The sending half of a continuation registered with [`UiContext::continuation`].
pub struct Continuation<T> {
  id: u64,
  mailbox: Option<Mailbox>,
  _value: PhantomData<fn(T)>,
}

impl<T: Send + 'static> Continuation<T> {
  /// Deliver `value`; the registered closure runs on the UI thread's next pump.
  pub fn post(mut self, value: T) -> bool {
    match self.mailbox.take() {
      Some(mailbox) => mailbox.send(Message::Resume(self.id, Box::new(value))),
      None => false,
    }
  }
}

impl<T> Drop for Continuation<T> {
  fn drop(&mut self) {
    if let Some(mailbox) = self.mailbox.take() {
      mailbox.send(Message::Cancel(self.id));
    }
  }
}
