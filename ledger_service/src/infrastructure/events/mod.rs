pub mod outbox_publisher;
