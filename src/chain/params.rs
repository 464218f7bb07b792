//! Per-device parameters of chained commands

use crate::command::ParameterError;

/// Places sparse `(device, value)` entries into one slot per device
///
/// Devices that aren't named get `None`. Indices must be smaller than `N`
/// and appear at most once.
pub fn distribute<T, const N: usize>(
    entries: &[(usize, T)],
) -> Result<[Option<T>; N], ParameterError>
where
    T: Copy,
{
    let mut slots = [None; N];

    for &(device, value) in entries {
        let slot = slots.get_mut(device).ok_or(ParameterError::DeviceIndex {
            index: device,
            chain_length: N,
        })?;
        if slot.is_some() {
            return Err(ParameterError::DuplicateDevice(device));
        }
        *slot = Some(value);
    }

    Ok(slots)
}

/// The parameters of a command, as a tuple
///
/// Implemented for tuples of up to four elements.
pub trait ParameterTuple: Copy {
    /// One array of `N` optional values per tuple element
    type Vectors<const N: usize>;

    /// Splits sparse `(device, tuple)` entries into per-element arrays
    fn expand<const N: usize>(entries: &[(usize, Self)])
        -> Result<Self::Vectors<N>, ParameterError>;
}

macro_rules! impl_parameter_tuple {
    ($($name:ident: $index:tt),+) => {
        impl<$($name: Copy),+> ParameterTuple for ($($name,)+) {
            type Vectors<const N: usize> = ($([Option<$name>; N],)+);

            fn expand<const N: usize>(
                entries: &[(usize, Self)],
            ) -> Result<Self::Vectors<N>, ParameterError> {
                let slots = distribute::<Self, N>(entries)?;
                Ok(($(slots.map(|slot| slot.map(|tuple| tuple.$index)),)+))
            }
        }
    };
}

impl_parameter_tuple!(A: 0);
impl_parameter_tuple!(A: 0, B: 1);
impl_parameter_tuple!(A: 0, B: 1, C: 2);
impl_parameter_tuple!(A: 0, B: 1, C: 2, D: 3);

/// Expands sparse `(device, tuple)` entries into one array per tuple element
///
/// ```
/// use dspin::{chain::expand_parameters, Direction};
///
/// let (directions, speeds) =
///     expand_parameters::<_, 3>(&[(2, (Direction::Reverse, 500))]).unwrap();
///
/// assert_eq!(directions, [None, None, Some(Direction::Reverse)]);
/// assert_eq!(speeds, [None, None, Some(500)]);
/// ```
pub fn expand_parameters<T, const N: usize>(
    entries: &[(usize, T)],
) -> Result<T::Vectors<N>, ParameterError>
where
    T: ParameterTuple,
{
    T::expand::<N>(entries)
}
