mod model;

pub use model::{log_sum_exp, touch_covariance, EmissionMode, GaussianState, GestureModel};
