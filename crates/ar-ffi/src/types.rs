/// Status codes returned by all FFI functions.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ARStatus {
    Ok = 0,
    ErrorInvalidArgument = 1,
    ErrorInvalidConfiguration = 2,
    ErrorMissingForward = 3,
    ErrorLengthMismatch = 4,
    ErrorInternal = 5,
}

/// Compute backend type selector.
///
/// Passed across the boundary as a `uint32_t` and checked with `TryFrom`.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ARBackendType {
    /// Host CPU.
    Cpu = 0,
    /// Metal when compiled in and present, CPU otherwise.
    Default = 1,
}

/// Activation selector.
///
/// Passed across the boundary as a `uint32_t` and checked with `TryFrom`.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ARActivationKind {
    Sigmoid = 0,
    Tanh = 1,
    Relu = 2,
    LeakyRelu = 3,
}

impl TryFrom<u32> for ARBackendType {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, u32> {
        match value {
            0 => Ok(ARBackendType::Cpu),
            1 => Ok(ARBackendType::Default),
            other => Err(other),
        }
    }
}

impl TryFrom<u32> for ARActivationKind {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, u32> {
        match value {
            0 => Ok(ARActivationKind::Sigmoid),
            1 => Ok(ARActivationKind::Tanh),
            2 => Ok(ARActivationKind::Relu),
            3 => Ok(ARActivationKind::LeakyRelu),
            other => Err(other),
        }
    }
}

impl ARActivationKind {
    pub fn to_kind(self, negative_slope: f32) -> ar_tensor::ActivationKind {
        match self {
            ARActivationKind::Sigmoid => ar_tensor::ActivationKind::Sigmoid,
            ARActivationKind::Tanh => ar_tensor::ActivationKind::Tanh,
            ARActivationKind::Relu => ar_tensor::ActivationKind::Relu,
            ARActivationKind::LeakyRelu => ar_tensor::ActivationKind::LeakyRelu { negative_slope },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discriminants_round_trip() {
        for kind in [
            ARActivationKind::Sigmoid,
            ARActivationKind::Tanh,
            ARActivationKind::Relu,
            ARActivationKind::LeakyRelu,
        ] {
            assert_eq!(ARActivationKind::try_from(kind as u32), Ok(kind));
        }
        assert_eq!(ARBackendType::try_from(1), Ok(ARBackendType::Default));
    }

    #[test]
    fn test_unknown_discriminants() {
        assert_eq!(ARActivationKind::try_from(4), Err(4));
        assert_eq!(ARBackendType::try_from(u32::MAX), Err(u32::MAX));
    }
}
