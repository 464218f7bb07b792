//! Column framing of daisy chain transactions

use core::fmt;

use super::Devices;
use crate::command::{Frame, ParameterError};

/// One request slot per device of a chain of `N`, ready to be sent
///
/// Present requests are right-padded with zeros to the length of the longest
/// one, absent slots are sent as zeros of that same length. The transaction
/// is sent as [`len`](Self::len) columns: column `i` holds byte `i` of every
/// device, in device order, within one chip select frame.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Transaction<const N: usize> {
    requests: [Option<Frame>; N],
    len: usize,
}

impl<const N: usize> Transaction<N> {
    /// Builds a transaction from one optional request per device
    pub fn new(requests: [Option<Frame>; N]) -> Self {
        let len = requests
            .iter()
            .flatten()
            .map(Frame::len)
            .max()
            .unwrap_or(0);

        Transaction {
            requests: requests.map(|request| request.map(|request| request.padded(len))),
            len,
        }
    }

    /// Sends the same request to every device
    pub fn broadcast(request: Frame) -> Self {
        Transaction {
            requests: [Some(request); N],
            len: request.len(),
        }
    }

    /// Sends a request to some devices, and NOP of the same length to the
    /// others
    pub fn targeted(request: Frame, devices: Devices<'_>) -> Result<Self, ParameterError> {
        let targets = devices.mask::<N>()?;
        let filler = Frame::zeroed(request.len());

        Ok(Transaction {
            requests: targets.map(|targeted| Some(if targeted { request } else { filler })),
            len: request.len(),
        })
    }

    /// Number of columns, which is also the length of every request
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether there is nothing to send
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The padded requests
    pub fn requests(&self) -> &[Option<Frame>; N] {
        &self.requests
    }

    /// The bytes of column `index`, in device order
    ///
    /// Absent slots and columns past the end read as zero.
    pub fn column(&self, index: usize) -> [u8; N] {
        self.requests.map(|request| {
            request
                .and_then(|request| request.as_bytes().get(index).copied())
                .unwrap_or(0)
        })
    }

    /// Sends every column through `transfer` and gathers the replies
    ///
    /// `transfer` exchanges one column in place. Replies are returned per
    /// device, absent slots getting `None`. Nothing is sent if every slot is
    /// absent.
    pub fn exchange<E>(
        &self,
        mut transfer: impl FnMut(&mut [u8; N]) -> Result<(), E>,
    ) -> Result<[Option<Frame>; N], E> {
        let mut replies = [Frame::zeroed(self.len); N];

        for index in 0..self.len {
            let mut column = self.column(index);
            transfer(&mut column)?;

            for (reply, byte) in replies.iter_mut().zip(column) {
                reply.as_mut_bytes()[index] = byte;
            }
        }

        Ok(core::array::from_fn(|device| {
            self.requests[device].map(|_| replies[device])
        }))
    }
}

impl<const N: usize> fmt::Debug for Transaction<N> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.requests.iter()).finish()
    }
}

#[cfg(feature = "defmt")]
impl<const N: usize> defmt::Format for Transaction<N> {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{}", self.requests)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::command::{SimpleOpcode, GET_STATUS_REQUEST};

    fn frame(bytes: &[u8]) -> Frame {
        Frame::from_slice(bytes).unwrap()
    }

    #[test]
    fn columns_interleave_devices() {
        let transaction = Transaction::new([
            Some(frame(&[0x11])),
            Some(frame(&[0x21, 0x22, 0x23])),
            None,
            Some(frame(&[0x41, 0x42])),
        ]);

        assert_eq!(transaction.len(), 3);
        assert_eq!(transaction.column(0), [0x11, 0x21, 0x00, 0x41]);
        assert_eq!(transaction.column(1), [0x00, 0x22, 0x00, 0x42]);
        assert_eq!(transaction.column(2), [0x00, 0x23, 0x00, 0x00]);

        let mut sent = Vec::new();
        let replies = transaction
            .exchange(|column| {
                sent.push(*column);
                for byte in column.iter_mut() {
                    *byte = byte.wrapping_add(1);
                }
                Ok::<(), ()>(())
            })
            .unwrap();

        assert_eq!(sent.len(), 3);
        assert_eq!(replies[0], Some(frame(&[0x12, 0x01, 0x01])));
        assert_eq!(replies[1], Some(frame(&[0x22, 0x23, 0x24])));
        assert_eq!(replies[2], None);
        assert_eq!(replies[3], Some(frame(&[0x42, 0x43, 0x01])));
    }

    #[test]
    fn present_requests_are_padded() {
        let transaction = Transaction::new([Some(frame(&[0xd0, 0x00, 0x00])), Some(frame(&[0xb8]))]);

        for request in transaction.requests().iter().flatten() {
            assert_eq!(request.len(), transaction.len());
        }
        assert_eq!(transaction.requests()[1], Some(frame(&[0xb8, 0x00, 0x00])));
    }

    #[test]
    fn absent_slots_send_nothing() {
        let transaction = Transaction::<3>::new([None; 3]);

        let replies = transaction
            .exchange(|_| -> Result<(), ()> { panic!("nothing should be sent") })
            .unwrap();

        assert!(transaction.is_empty());
        assert_eq!(replies, [None; 3]);
    }

    #[test]
    fn broadcast_replicates_the_request() {
        let transaction = Transaction::<3>::broadcast(GET_STATUS_REQUEST);

        assert_eq!(transaction.len(), 3);
        assert_eq!(transaction.column(0), [0xd0; 3]);
        assert_eq!(transaction.column(1), [0x00; 3]);
    }

    #[test]
    fn targeted_fills_with_nop() {
        let request = SimpleOpcode::SoftStop.request();

        let transaction = Transaction::<3>::targeted(request, Devices::Only(&[1])).unwrap();

        assert_eq!(transaction.column(0), [0x00, 0xb0, 0x00]);
        assert!(transaction.requests().iter().all(Option::is_some));

        assert_eq!(
            Transaction::<3>::targeted(request, Devices::Only(&[3])),
            Err(ParameterError::DeviceIndex {
                index: 3,
                chain_length: 3
            })
        );
    }
}
