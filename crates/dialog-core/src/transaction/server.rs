//! Server transaction state machines (RFC 3261 sections 17.2.1 and 17.2.2)
//!
//! The INVITE server also keeps a 2xx alive: it stays in Completed, re-sends
//! the 2xx on Timer G and ends on the ACK the dialog layer routes to it, or
//! on Timer H.

use voxcore_sip_core::{Method, SipMessage};

use super::core::{Transaction, TransactionAction, TransactionEvent};
use super::state::TransactionState;
use super::timer::TransactionTimer;
use crate::errors::{Error, Result};

impl Transaction {
    pub(super) fn server_invite(&mut self, event: TransactionEvent) -> Result<Vec<TransactionAction>> {
        use TransactionEvent::*;
        use TransactionState::*;

        let mut actions = Vec::new();
        match (self.state, event) {
            (Proceeding, IncomingMessage(SipMessage::Request(request)))
                if request.method == Method::Invite =>
            {
                self.retransmit(&mut actions);
            }
            (Proceeding, Send(SipMessage::Response(response))) => {
                let status = response.status;
                self.status_code = Some(status);
                self.last_response = Some(response.clone());
                self.transmit(response.into(), &mut actions);

                if status.is_success() {
                    // A 2xx is resent end to end until the ACK arrives, on
                    // reliable transports too
                    self.retransmit_interval = self.settings.t1;
                    actions.push(TransactionAction::StartTimer(
                        TransactionTimer::G,
                        self.retransmit_interval,
                    ));
                    self.start(TransactionTimer::H, &mut actions);
                    self.transition(Completed, &mut actions);
                } else if status.is_final() {
                    self.arm_retransmission(TransactionTimer::G, &mut actions);
                    self.start(TransactionTimer::H, &mut actions);
                    self.transition(Completed, &mut actions);
                }
            }
            (Completed, TimerFired(TransactionTimer::G)) => {
                self.retransmit(&mut actions);
                self.retransmit_interval = (self.retransmit_interval * 2).min(self.settings.t2);
                actions.push(TransactionAction::StartTimer(
                    TransactionTimer::G,
                    self.retransmit_interval,
                ));
            }
            (Completed, TimerFired(TransactionTimer::H)) => {
                return Ok(self.timeout(TransactionTimer::H));
            }
            (Completed, IncomingMessage(SipMessage::Request(request))) => match request.method {
                Method::Invite => self.retransmit(&mut actions),
                Method::Ack => {
                    actions.push(TransactionAction::CancelTimer(TransactionTimer::G));
                    actions.push(TransactionAction::CancelTimer(TransactionTimer::H));
                    if self.status_code.is_some_and(|status| status.is_success()) {
                        // The ACK of a 2xx is its own transaction; nothing
                        // left to absorb
                        self.finish(&mut actions);
                    } else {
                        self.start(TransactionTimer::I, &mut actions);
                        self.transition(Confirmed, &mut actions);
                    }
                }
                _ => {}
            },
            (Confirmed, TimerFired(TransactionTimer::I)) => self.finish(&mut actions),
            (_, Send(SipMessage::Request(_))) => {
                return Err(Error::bad_argument("a server transaction cannot send requests"));
            }
            (_, Send(_)) => return Err(self.wrong_state("send response")),
            (_, event) => return Ok(self.ignore(&event)),
        }
        Ok(actions)
    }

    pub(super) fn server_non_invite(
        &mut self,
        event: TransactionEvent,
    ) -> Result<Vec<TransactionAction>> {
        use TransactionEvent::*;
        use TransactionState::*;

        let mut actions = Vec::new();
        match (self.state, event) {
            // Nothing to resend until the TU responds
            (Trying, IncomingMessage(SipMessage::Request(_))) => {}
            (Proceeding | Completed, IncomingMessage(SipMessage::Request(_))) => {
                self.retransmit(&mut actions);
            }
            (Trying | Proceeding, Send(SipMessage::Response(response))) => {
                let status = response.status;
                self.status_code = Some(status);
                self.last_response = Some(response.clone());
                self.transmit(response.into(), &mut actions);

                if status.is_provisional() {
                    self.transition(Proceeding, &mut actions);
                } else {
                    self.start(TransactionTimer::J, &mut actions);
                    self.transition(Completed, &mut actions);
                }
            }
            (Completed, TimerFired(TransactionTimer::J)) => self.finish(&mut actions),
            (_, Send(SipMessage::Request(_))) => {
                return Err(Error::bad_argument("a server transaction cannot send requests"));
            }
            (_, Send(_)) => return Err(self.wrong_state("send response")),
            (_, event) => return Ok(self.ignore(&event)),
        }
        Ok(actions)
    }
}
