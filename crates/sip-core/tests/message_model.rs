use proptest::prelude::*;
use voxcore_sip_core::prelude::*;

proptest! {
    /// Branch cookie detection must not depend on the case of the cookie.
    #[test]
    fn branch_cookie_detected_in_any_case(mask in proptest::collection::vec(any::<bool>(), 7), suffix in "[a-zA-Z0-9]{1,16}") {
        let cookie: String = "z9hG4bK"
            .chars()
            .zip(mask)
            .map(|(c, upper)| if upper { c.to_ascii_uppercase() } else { c.to_ascii_lowercase() })
            .collect();
        let via = Via::udp("192.0.2.1", Some(5060), format!("{}{}", cookie, suffix));
        prop_assert!(via.has_rfc3261_branch());
    }
}

/// A response built for a request answers the same transaction and dialog.
#[test]
fn test_response_mirrors_request() {
    let request = RequestBuilder::new(Method::Invite, "sip:bob@192.0.2.4".parse().unwrap())
        .via(Via::udp("192.0.2.1", Some(5060), generate_branch()))
        .from(NameAddr::new("sip:alice@192.0.2.1".parse().unwrap()).with_tag(generate_tag()))
        .to(NameAddr::new("sip:bob@192.0.2.4".parse().unwrap()))
        .call_id(generate_call_id())
        .cseq(1)
        .record_route("sip:p1.example.com;lr".parse().unwrap())
        .build();

    let response = Response::from_request(&request, StatusCode::OK);
    assert_eq!(response.headers.top_via().unwrap().branch(), request.branch());
    assert_eq!(response.headers.cseq, request.headers.cseq);
    assert!(response.headers.record_route.is_empty());
    assert!(SipMessage::from(response).to_string().starts_with("SIP/2.0 200 OK\r\n"));
}
