//! Frame lifecycle scenarios driven against a simulated device

mod frame_lifecycle;
