//! 地标集合
//!
//! 每个变量一组严格递增的参考值，把连续域划分为定性区间。
//! 区间约定为半开：Below 即 value < l[0]；Above 即 value >= l[last]；
//! Between(i) 即 l[i] <= value < l[i+1]。

use serde::{Deserialize, Serialize};

use crate::core::ExecutorError;
use crate::qspace::Band;

/// 地标边界的浮点抖动容差：与地标相距不超过该值的量值按落在地标上归类
const LANDMARK_SNAP: f64 = 1e-9;

/// 单变量的有序地标集合（构造时校验严格递增与有限性）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandmarkSet {
    values: Vec<f64>,
}

impl LandmarkSet {
    pub fn new(variable: &str, values: Vec<f64>) -> Result<Self, ExecutorError> {
        if values.is_empty() {
            return Err(ExecutorError::InvalidLandmarkSet {
                variable: variable.to_string(),
                reason: "empty landmark list".to_string(),
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ExecutorError::InvalidLandmarkSet {
                variable: variable.to_string(),
                reason: "non-finite landmark value".to_string(),
            });
        }
        if values.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ExecutorError::InvalidLandmarkSet {
                variable: variable.to_string(),
                reason: "not strictly increasing".to_string(),
            });
        }
        Ok(Self { values })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 二分定位：返回量值相对地标的定性区间，O(log L)
    pub fn locate(&self, value: f64) -> Band {
        // k = 不大于 value（含抖动容差）的地标个数
        let k = self.values.partition_point(|&l| l <= value + LANDMARK_SNAP);
        if k == 0 {
            Band::Below
        } else if k == self.values.len() {
            Band::Above
        } else {
            Band::Between(k - 1)
        }
    }
}
