pub mod radio_task;
pub mod sensor_task;
