//! Channel naming
//!
//! Both participants compute the same peer channel names from their own view
//! of (self, peer), so no discovery step is needed. GUI channels belong to a
//! single process and are named from its own identity only.

use crate::identity::Identity;

/// The four queue names a participant opens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelNames {
    /// Local relay writes, peer reads
    pub to_peer: String,
    /// Peer writes, local relay reads
    pub from_peer: String,
    /// Local relay writes, GUI client reads
    pub gui_out: String,
    /// GUI client writes, local relay reads
    pub gui_in: String,
}

impl ChannelNames {
    pub fn derive(local: &Identity, peer: &Identity) -> Self {
        Self {
            to_peer: peer_channel(local, peer),
            from_peer: peer_channel(peer, local),
            gui_out: format!("/mq_gui_rx_{}", local.as_str()),
            gui_in: format!("/mq_gui_tx_{}", local.as_str()),
        }
    }
}

fn peer_channel(sender: &Identity, receiver: &Identity) -> String {
    format!("/mq_{}_to_{}", sender.channel_key(), receiver.channel_key())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id(name: &str) -> Identity {
        Identity::new(name).unwrap()
    }

    #[test]
    fn fixed_role_names() {
        let names = ChannelNames::derive(&id("A"), &id("B"));
        assert_eq!(names.to_peer, "/mq_a_to_b");
        assert_eq!(names.from_peer, "/mq_b_to_a");
        assert_eq!(names.gui_out, "/mq_gui_rx_A");
        assert_eq!(names.gui_in, "/mq_gui_tx_A");
    }

    #[test]
    fn gui_channels_are_not_shared() {
        let alice = ChannelNames::derive(&id("alice"), &id("bob"));
        let bob = ChannelNames::derive(&id("bob"), &id("alice"));
        assert_ne!(alice.gui_out, bob.gui_out);
        assert_ne!(alice.gui_in, bob.gui_in);
    }

    proptest! {
        #[test]
        fn peer_names_are_symmetric(x in "[A-Za-z0-9_]{1,32}", y in "[A-Za-z0-9_]{1,32}") {
            prop_assume!(x.to_ascii_lowercase() != y.to_ascii_lowercase());
            let (x, y) = (id(&x), id(&y));

            let from_x = ChannelNames::derive(&x, &y);
            let from_y = ChannelNames::derive(&y, &x);

            prop_assert_eq!(&from_x.to_peer, &from_y.from_peer);
            prop_assert_eq!(&from_x.from_peer, &from_y.to_peer);
            prop_assert_ne!(&from_x.to_peer, &from_x.from_peer);
        }
    }
}
