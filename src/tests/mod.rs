/*******************************************************************************
 * Copyright (c) 2024 Cénotélie Opérations SAS (cenotelie.fr)
 ******************************************************************************/

use core::cell::RefCell;


/// The size of the queue to use
pub const SCALE_QUEUE_SIZE: u32 = 256;

/// The number of messages
pub const SCALE_MSG_COUNT: usize = 100_000;

/// The number of producers in the multi-producer tests
pub const SCALE_PRODUCERS: usize = 4;

/// The number of consumers in the multi-consumer tests
pub const SCALE_CONSUMERS: usize = 4;

fn assert_send<T: Send>(_thing: &T) {}
fn assert_sync<T: Sync>(_thing: &T) {}

#[test]
fn queue_is_send_sync() {
    // usize: Send + Sync
    let queue = crate::queue::Queue::<usize>::new(4);
    assert_send(&queue);
    assert_sync(&queue);

    // RefCell: Send + !Sync, enough for a queue that moves items out
    let queue = crate::queue::Queue::<RefCell<usize>>::new(4);
    assert_send(&queue);
    assert_sync(&queue);
}
