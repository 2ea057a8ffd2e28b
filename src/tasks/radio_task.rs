use embassy_executor::task;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Receiver;

use wearable_health::drivers::gatt::NotificationQueue;
use wearable_health::state::SnapshotFrame;
use wearable_health::telemetry::TelemetryConsumer;

use crate::usb::UsbSerial;

/// Radio context: wakes on every arriving snapshot and pushes the resulting
/// characteristic notifications out over USB CDC-ACM.
#[task]
pub async fn radio_task(
    mut usb_serial: UsbSerial<'static>,
    relay_rx: Receiver<'static, CriticalSectionRawMutex, SnapshotFrame, 1>,
) {
    let mut consumer = TelemetryConsumer::new(NotificationQueue::new());

    loop {
        let frame = relay_rx.receive().await;
        if consumer.on_receive(&frame).is_err() {
            continue;
        }

        // Drain even with no host attached so the queue never backs up
        let connected = usb_serial.dtr();
        while let Some(notification) = consumer.publisher_mut().pop() {
            if connected {
                let _ = usb_serial.write_packet(&notification).await;
            }
        }
    }
}
