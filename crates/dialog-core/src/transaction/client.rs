//! Client transaction state machines (RFC 3261 sections 17.1.1 and 17.1.2)

use voxcore_sip_core::{CSeq, Method, Request, Response, SipMessage};

use super::core::{Transaction, TransactionAction, TransactionEvent};
use super::state::TransactionState;
use super::timer::TransactionTimer;
use crate::errors::{Error, Result};

impl Transaction {
    pub(super) fn client_invite(&mut self, event: TransactionEvent) -> Result<Vec<TransactionAction>> {
        use TransactionEvent::*;
        use TransactionState::*;

        let mut actions = Vec::new();
        match (self.state, event) {
            (Calling, Send(SipMessage::Request(request))) if self.last_sent.is_none() => {
                self.request = request.clone();
                self.transmit(request.into(), &mut actions);
                self.arm_retransmission(TransactionTimer::A, &mut actions);
                self.start(TransactionTimer::B, &mut actions);
            }
            (Calling, TimerFired(TransactionTimer::A)) => {
                self.retransmit(&mut actions);
                // INVITE retransmissions keep doubling; only B bounds them
                self.retransmit_interval *= 2;
                actions.push(TransactionAction::StartTimer(
                    TransactionTimer::A,
                    self.retransmit_interval,
                ));
            }
            (Calling, TimerFired(TransactionTimer::B)) => {
                return Ok(self.timeout(TransactionTimer::B));
            }
            (Proceeding, TimerFired(TransactionTimer::C)) => {
                return Ok(self.timeout(TransactionTimer::C));
            }
            (Calling | Proceeding, IncomingMessage(SipMessage::Response(response))) => {
                let status = response.status;
                self.status_code = Some(status);
                self.last_response = Some(response.clone());

                if status.is_provisional() {
                    if self.state == Calling {
                        actions.push(TransactionAction::CancelTimer(TransactionTimer::A));
                        actions.push(TransactionAction::CancelTimer(TransactionTimer::B));
                    }
                    if self.proxy_mode {
                        actions.push(TransactionAction::StartTimer(
                            TransactionTimer::C,
                            self.settings.timer_c,
                        ));
                    }
                    actions.push(TransactionAction::Deliver(response.into()));
                    self.transition(Proceeding, &mut actions);
                } else if status.is_success() {
                    // The ACK for a 2xx belongs to the dialog layer
                    actions.push(TransactionAction::Deliver(response.into()));
                    self.finish(&mut actions);
                } else {
                    let ack = self.build_ack(&response);
                    self.transmit(ack.into(), &mut actions);
                    for timer in [TransactionTimer::A, TransactionTimer::B, TransactionTimer::C] {
                        actions.push(TransactionAction::CancelTimer(timer));
                    }
                    self.start(TransactionTimer::D, &mut actions);
                    actions.push(TransactionAction::Deliver(response.into()));
                    self.transition(Completed, &mut actions);
                }
            }
            (Completed, IncomingMessage(SipMessage::Response(response)))
                if response.is_final() && !response.is_success() =>
            {
                self.retransmit(&mut actions);
            }
            (Completed, TimerFired(TransactionTimer::D)) => self.finish(&mut actions),
            (_, Send(SipMessage::Response(_))) => {
                return Err(Error::bad_argument("a client transaction cannot send responses"));
            }
            (_, Send(_)) => return Err(self.wrong_state("send request")),
            (_, event) => return Ok(self.ignore(&event)),
        }
        Ok(actions)
    }

    pub(super) fn client_non_invite(
        &mut self,
        event: TransactionEvent,
    ) -> Result<Vec<TransactionAction>> {
        use TransactionEvent::*;
        use TransactionState::*;

        let mut actions = Vec::new();
        match (self.state, event) {
            (Trying, Send(SipMessage::Request(request))) if self.last_sent.is_none() => {
                self.request = request.clone();
                self.transmit(request.into(), &mut actions);
                self.arm_retransmission(TransactionTimer::E, &mut actions);
                self.start(TransactionTimer::F, &mut actions);
            }
            (Trying | Proceeding, TimerFired(TransactionTimer::E)) => {
                self.retransmit(&mut actions);
                self.retransmit_interval = if self.state == Proceeding {
                    self.settings.t2
                } else {
                    (self.retransmit_interval * 2).min(self.settings.t2)
                };
                actions.push(TransactionAction::StartTimer(
                    TransactionTimer::E,
                    self.retransmit_interval,
                ));
            }
            (Trying | Proceeding, TimerFired(TransactionTimer::F)) => {
                return Ok(self.timeout(TransactionTimer::F));
            }
            (Trying | Proceeding, IncomingMessage(SipMessage::Response(response))) => {
                let status = response.status;
                self.status_code = Some(status);
                self.last_response = Some(response.clone());
                actions.push(TransactionAction::Deliver(response.into()));

                if status.is_provisional() {
                    self.transition(Proceeding, &mut actions);
                } else {
                    actions.push(TransactionAction::CancelTimer(TransactionTimer::E));
                    actions.push(TransactionAction::CancelTimer(TransactionTimer::F));
                    self.start(TransactionTimer::K, &mut actions);
                    self.transition(Completed, &mut actions);
                }
            }
            (Completed, TimerFired(TransactionTimer::K)) => self.finish(&mut actions),
            (_, Send(SipMessage::Response(_))) => {
                return Err(Error::bad_argument("a client transaction cannot send responses"));
            }
            (_, Send(_)) => return Err(self.wrong_state("send request")),
            (_, event) => return Ok(self.ignore(&event)),
        }
        Ok(actions)
    }

    /// ACK for a non-2xx final response: same Request-URI, top Via and
    /// Routes as the INVITE, To taken from the response
    pub(super) fn build_ack(&self, response: &Response) -> Request {
        let invite = &self.request;
        let mut ack = Request::new(Method::Ack, invite.uri.clone());
        ack.headers.via = invite.headers.via.iter().take(1).cloned().collect();
        ack.headers.from = invite.headers.from.clone();
        ack.headers.to = response.headers.to.clone();
        ack.headers.call_id = invite.headers.call_id.clone();
        ack.headers.cseq = invite
            .headers
            .cseq
            .as_ref()
            .map(|cseq| CSeq::new(cseq.seq, Method::Ack));
        ack.headers.route = invite.headers.route.clone();
        ack.headers.max_forwards = Some(70);
        ack
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use voxcore_sip_core::prelude::*;

    use super::*;
    use crate::transaction::timer::TimerSettings;

    fn destination() -> SocketAddr {
        "192.0.2.4:5060".parse().unwrap()
    }

    fn request(method: Method) -> Request {
        RequestBuilder::new(method, "sip:bob@192.0.2.4".parse().unwrap())
            .via(Via::udp("192.0.2.1", Some(5060), "z9hG4bKclient1"))
            .from(NameAddr::new("sip:alice@192.0.2.1".parse().unwrap()).with_tag("a1"))
            .to(NameAddr::new("sip:bob@192.0.2.4".parse().unwrap()))
            .call_id("call-client")
            .cseq(1)
            .route("sip:proxy.example.com;lr".parse().unwrap())
            .build()
    }

    fn start(method: Method, reliable: bool) -> (Transaction, Vec<TransactionAction>) {
        let req = request(method);
        let mut tsx = Transaction::new_uac(req.clone(), destination(), reliable, TimerSettings::default()).unwrap();
        let actions = tsx.process_event(TransactionEvent::Send(req.into())).unwrap();
        (tsx, actions)
    }

    fn response(tsx: &Transaction, status: StatusCode) -> TransactionEvent {
        let resp = Response::from_request(tsx.request(), status).with_to_tag("b1");
        TransactionEvent::IncomingMessage(resp.into())
    }

    fn started(actions: &[TransactionAction]) -> Vec<(TransactionTimer, Duration)> {
        actions
            .iter()
            .filter_map(|a| match a {
                TransactionAction::StartTimer(t, d) => Some((*t, *d)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_invite_send_arms_a_and_b() {
        let (tsx, actions) = start(Method::Invite, false);
        assert_eq!(tsx.state(), TransactionState::Calling);
        assert!(matches!(actions[0], TransactionAction::Transmit(_)));
        assert_eq!(
            started(&actions),
            vec![
                (TransactionTimer::A, Duration::from_millis(500)),
                (TransactionTimer::B, Duration::from_secs(32))
            ]
        );
    }

    #[test]
    fn test_reliable_invite_skips_timer_a() {
        let (_, actions) = start(Method::Invite, true);
        assert_eq!(started(&actions), vec![(TransactionTimer::B, Duration::from_secs(32))]);
    }

    #[test]
    fn test_timer_a_doubles_without_cap() {
        let (mut tsx, _) = start(Method::Invite, false);
        let mut intervals = Vec::new();
        for _ in 0..5 {
            let actions = tsx.process_event(TransactionEvent::TimerFired(TransactionTimer::A)).unwrap();
            intervals.extend(started(&actions).into_iter().map(|(_, d)| d.as_millis()));
        }
        assert_eq!(intervals, vec![1000, 2000, 4000, 8000, 16000]);
        assert_eq!(tsx.retransmit_count(), 5);
    }

    #[test]
    fn test_non_invite_backoff_is_capped_at_t2() {
        let (mut tsx, _) = start(Method::Options, false);
        let mut intervals = Vec::new();
        for _ in 0..4 {
            let actions = tsx.process_event(TransactionEvent::TimerFired(TransactionTimer::E)).unwrap();
            intervals.extend(started(&actions).into_iter().map(|(_, d)| d.as_millis()));
        }
        assert_eq!(intervals, vec![1000, 2000, 4000, 4000]);
    }

    #[test]
    fn test_non_invite_proceeding_retransmits_at_t2() {
        let (mut tsx, _) = start(Method::Options, false);
        let trying = response(&tsx, StatusCode::TRYING);
        tsx.process_event(trying).unwrap();
        assert_eq!(tsx.state(), TransactionState::Proceeding);
        let actions = tsx.process_event(TransactionEvent::TimerFired(TransactionTimer::E)).unwrap();
        assert_eq!(started(&actions), vec![(TransactionTimer::E, Duration::from_secs(4))]);
    }

    #[test]
    fn test_invite_provisional_then_success() {
        let (mut tsx, _) = start(Method::Invite, false);
        let ringing = response(&tsx, StatusCode::RINGING);
        let actions = tsx.process_event(ringing).unwrap();
        assert!(actions.contains(&TransactionAction::CancelTimer(TransactionTimer::A)));
        assert!(actions.contains(&TransactionAction::CancelTimer(TransactionTimer::B)));
        assert_eq!(tsx.state(), TransactionState::Proceeding);

        let ok = response(&tsx, StatusCode::OK);
        let actions = tsx.process_event(ok).unwrap();
        assert!(matches!(actions[0], TransactionAction::Deliver(_)));
        assert_eq!(tsx.state(), TransactionState::Terminated);
        assert_eq!(tsx.status_code(), Some(StatusCode::OK));
        assert!(!actions.iter().any(|a| matches!(a, TransactionAction::Transmit(_))));
    }

    #[test]
    fn test_invite_failure_generates_ack() {
        let (mut tsx, _) = start(Method::Invite, false);
        let busy = response(&tsx, StatusCode::BUSY_HERE);
        let actions = tsx.process_event(busy).unwrap();
        assert_eq!(tsx.state(), TransactionState::Completed);

        let ack = actions
            .iter()
            .find_map(|a| match a {
                TransactionAction::Transmit(SipMessage::Request(r)) => Some(r.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(ack.method, Method::Ack);
        assert_eq!(ack.uri, tsx.request().uri);
        assert_eq!(ack.headers.via.len(), 1);
        assert_eq!(ack.headers.cseq, Some(CSeq::new(1, Method::Ack)));
        assert_eq!(ack.headers.to_tag(), Some("b1"));
        assert_eq!(ack.headers.route, tsx.request().headers.route);
        assert_eq!(started(&actions), vec![(TransactionTimer::D, Duration::from_secs(32))]);

        // A retransmitted final response gets the same ACK again
        let again = response(&tsx, StatusCode::BUSY_HERE);
        let actions = tsx.process_event(again).unwrap();
        assert_eq!(actions, vec![TransactionAction::Transmit(ack.into())]);

        let actions = tsx.process_event(TransactionEvent::TimerFired(TransactionTimer::D)).unwrap();
        assert_eq!(
            actions,
            vec![TransactionAction::StateChanged {
                from: TransactionState::Completed,
                to: TransactionState::Terminated
            }]
        );
    }

    #[test]
    fn test_timer_b_times_out_with_408() {
        let (mut tsx, _) = start(Method::Invite, false);
        tsx.process_event(TransactionEvent::TimerFired(TransactionTimer::B)).unwrap();
        assert_eq!(tsx.state(), TransactionState::Terminated);
        assert_eq!(tsx.status_code(), Some(StatusCode::REQUEST_TIMEOUT));
        assert_eq!(tsx.termination_reason().and_then(|r| r.as_error()), Some(Error::Timeout));
    }

    #[test]
    fn test_proxy_mode_arms_timer_c() {
        let req = request(Method::Invite);
        let mut tsx = Transaction::new_uac(req.clone(), destination(), false, TimerSettings::default())
            .unwrap()
            .with_proxy_mode(true);
        tsx.process_event(TransactionEvent::Send(req.into())).unwrap();
        let ringing = response(&tsx, StatusCode::RINGING);
        let actions = tsx.process_event(ringing).unwrap();
        assert!(started(&actions).contains(&(TransactionTimer::C, Duration::from_secs(180))));

        tsx.process_event(TransactionEvent::TimerFired(TransactionTimer::C)).unwrap();
        assert_eq!(tsx.status_code(), Some(StatusCode::REQUEST_TIMEOUT));
    }

    #[test]
    fn test_non_invite_final_absorbs_retransmissions() {
        let (mut tsx, _) = start(Method::Register, true);
        let ok = response(&tsx, StatusCode::OK);
        let actions = tsx.process_event(ok).unwrap();
        assert_eq!(tsx.state(), TransactionState::Completed);
        assert_eq!(started(&actions), vec![(TransactionTimer::K, Duration::ZERO)]);

        let again = response(&tsx, StatusCode::OK);
        assert!(tsx.process_event(again).unwrap().is_empty());
    }

    #[test]
    fn test_send_twice_is_invalid_state() {
        let (mut tsx, _) = start(Method::Options, false);
        let err = tsx
            .process_event(TransactionEvent::Send(tsx.request().clone().into()))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[test]
    fn test_ack_cannot_create_transaction() {
        let err = Transaction::new_uac(request(Method::Ack), destination(), false, TimerSettings::default())
            .unwrap_err();
        assert!(matches!(err, Error::BadArgument(_)));
    }
}
