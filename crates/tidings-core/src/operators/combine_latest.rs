//! Joining the latest values of several publishers.
//!
//! A combined subscription keeps one slot per input. Every upstream value
//! overwrites its slot; once every slot is filled, each further update emits
//! the full tuple. The slots belong to the subscription, so two subscribers
//! to the same combined publisher never see each other's partial state.

use std::sync::{Arc, Mutex};

use crate::cancellable::AnyCancellable;
use crate::publisher::{Publisher, Receiver};
use crate::sync::lock;

/// Latest-value storage for one subscription.
trait Slots {
    type Full;

    /// The complete tuple, if every slot holds a value.
    fn full(&self) -> Option<Self::Full>;
}

macro_rules! impl_slots {
    ($($t:ident : $i:tt),+) => {
        impl<$($t: Clone),+> Slots for ($(Option<$t>,)+) {
            type Full = ($($t,)+);

            fn full(&self) -> Option<Self::Full> {
                Some(($(self.$i.as_ref()?.clone(),)+))
            }
        }
    };
}

impl_slots!(A: 0, B: 1);
impl_slots!(A: 0, B: 1, C: 2);
impl_slots!(A: 0, B: 1, C: 2, D: 3);

fn tear_down(tokens: Vec<AnyCancellable>) -> AnyCancellable {
    AnyCancellable::from_fn(move || {
        for token in tokens {
            token.cancel();
        }
    })
}

macro_rules! combine_latest {
    (
        $(#[$meta:meta])*
        $name:ident, $first:ident : $fi:tt, [$($rest:ident : $ri:tt),+]
    ) => {
        $(#[$meta])*
        pub struct $name<$first, $($rest),+> {
            upstreams: ($first, $($rest),+),
        }

        impl<$first, $($rest),+> $name<$first, $($rest),+> {
            pub(crate) fn new(upstreams: ($first, $($rest),+)) -> Self {
                Self { upstreams }
            }
        }

        impl<$first, $($rest),+> Publisher for $name<$first, $($rest),+>
        where
            $first: Publisher,
            $first::Output: Clone + Send,
            $(
                $rest: Publisher<Failure = $first::Failure>,
                $rest::Output: Clone + Send,
            )+
        {
            type Output = ($first::Output, $($rest::Output),+);
            type Failure = $first::Failure;

            fn subscribe(&self, receive: Receiver<Self::Output>) -> AnyCancellable {
                let slots = Arc::new(Mutex::new((
                    None::<$first::Output>,
                    $(None::<$rest::Output>,)+
                )));
                let mut tokens = Vec::new();

                {
                    let slots = Arc::clone(&slots);
                    let receive = Arc::clone(&receive);
                    tokens.push(self.upstreams.$fi.subscribe(Arc::new(
                        move |value: $first::Output| {
                            let full = {
                                let mut slots = lock(&slots);
                                slots.$fi = Some(value);
                                slots.full()
                            };
                            if let Some(full) = full {
                                receive(full);
                            }
                        },
                    )));
                }
                $(
                    {
                        let slots = Arc::clone(&slots);
                        let receive = Arc::clone(&receive);
                        tokens.push(self.upstreams.$ri.subscribe(Arc::new(
                            move |value: $rest::Output| {
                                let full = {
                                    let mut slots = lock(&slots);
                                    slots.$ri = Some(value);
                                    slots.full()
                                };
                                if let Some(full) = full {
                                    receive(full);
                                }
                            },
                        )));
                    }
                )+

                tear_down(tokens)
            }
        }
    };
}

combine_latest!(
    /// Emits `(a, b)` whenever either input updates, once both have emitted.
    CombineLatest, P0: 0, [P1: 1]
);

combine_latest!(
    /// Three-input form of [`CombineLatest`].
    CombineLatest3, P0: 0, [P1: 1, P2: 2]
);

combine_latest!(
    /// Four-input form of [`CombineLatest`].
    CombineLatest4, P0: 0, [P1: 1, P2: 2, P3: 3]
);
