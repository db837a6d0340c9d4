// # Change Notifiers
//
// Notifiers announce a completed address change. They run after the new
// addresses were persisted, so a failed notice is reported but never retried.
//
// | Block        | Transport                                    |
// |--------------|----------------------------------------------|
// | `sipgateSMS` | sipgate.io REST API, `POST /v2/sessions/sms` |
// | `email`      | SMTP over implicit TLS or STARTTLS           |

pub mod email;
pub mod sipgate;

pub use email::{EmailFactory, EmailNotifier};
pub use sipgate::{SipgateSmsFactory, SipgateSmsNotifier};

use ddns_core::config::{EMAIL, SIPGATE_SMS};
use ddns_core::registry::Registry;

/// Register every notifier of this crate under its block name
pub fn register(registry: &mut Registry) {
    registry.register_notifier(SIPGATE_SMS, Box::new(SipgateSmsFactory::new()));
    registry.register_notifier(EMAIL, Box::new(EmailFactory::new()));
}
