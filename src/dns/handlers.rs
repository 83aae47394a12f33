use crate::error::Error;
use crate::zone::{DnsRecord, ZoneStore};
use std::str::FromStr;
use tracing::error;
use trust_dns_proto::rr::rdata::SOA;
use trust_dns_server::authority::MessageResponseBuilder;
use trust_dns_server::client::op::{Header, MessageType, OpCode};
use trust_dns_server::client::rr::rdata::TXT;
use trust_dns_server::client::rr::{LowerName, Name, RData, Record, RecordType};
use trust_dns_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};

const RECORD_TTL: u32 = 3_600;

/// Stateless per-message handler. Answer content is derived from the zone
/// store; nothing is kept between requests.
#[derive(Clone)]
pub struct Handler {
    base: LowerName,
    ns1: Name,
    hostmaster: Name,
    zones: ZoneStore,
}

impl Handler {
    pub(super) fn new(base_hostname: &str, zones: ZoneStore) -> Result<Self, Error> {
        let base = Name::from_str(base_hostname)?;
        let ns1 = Name::from_str("ns1")?.append_domain(&base)?;
        let hostmaster = Name::from_str("hostmaster")?.append_domain(&base)?;
        Ok(Handler {
            base: LowerName::from(base),
            ns1,
            hostmaster,
            zones,
        })
    }

    fn is_authoritative_for(&self, name: &LowerName) -> bool {
        self.base.zone_of(name)
    }

    async fn dispatch_request<R: ResponseHandler>(
        &self,
        request: &Request,
        response: R,
    ) -> Result<ResponseInfo, Error> {
        if request.op_code() != OpCode::Query || request.message_type() != MessageType::Query {
            return self.send_reply(request, response, false, &[]).await;
        }

        let query_name = request.query().name().clone();
        if !self.is_authoritative_for(&query_name) {
            return self.send_reply(request, response, false, &[]).await;
        }

        let name = Name::from(&query_name);
        let answers = match request.query().query_type() {
            RecordType::SOA => vec![self.soa_record(name)],
            RecordType::NS => vec![self.ns_record(name)],
            _ => match self.stored_records(&name).await {
                Ok(answers) => answers,
                Err(err) => {
                    // Internal failures still get an empty authoritative
                    // reply; DNS has no useful error channel for them.
                    error!(zone = %name, "failed to load zone records: {err}");
                    Vec::new()
                }
            },
        };

        self.send_reply(request, response, true, &answers).await
    }

    fn soa_record(&self, name: Name) -> Record {
        let rdata = RData::SOA(SOA::new(
            self.ns1.clone(),
            self.hostmaster.clone(),
            1,         // Serial; no zone transfer, so it never advances.
            86_400,    // Refresh.
            7_200,     // Retry.
            3_600_000, // Expire.
            3_600,     // Minimum TTL.
        ));
        Record::from_rdata(name, 0, rdata)
    }

    fn ns_record(&self, name: Name) -> Record {
        Record::from_rdata(name, RECORD_TTL, RData::NS(self.ns1.clone()))
    }

    /// Answers for a query against the zone store. Stored records of
    /// unrecognized types are skipped, not erred.
    async fn stored_records(&self, name: &Name) -> Result<Vec<Record>, Error> {
        let records = self.zones.get_records(&name.to_string()).await?;
        Ok(records
            .iter()
            .filter_map(|record| record_to_answer(name, record))
            .collect())
    }

    async fn send_reply<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
        authoritative: bool,
        answers: &[Record],
    ) -> Result<ResponseInfo, Error> {
        let mut header = Header::response_from_request(request.header());
        header.set_authoritative(authoritative);
        let builder = MessageResponseBuilder::from_message_request(request);
        let response = builder.build(header, answers.iter(), &[], &[], &[]);
        Ok(response_handle.send_response(response).await?)
    }
}

/// Convert a stored record into a wire answer for `zone`, or `None` for
/// record types the responder does not synthesize.
fn record_to_answer(zone: &Name, record: &DnsRecord) -> Option<Record> {
    match record.record_type.as_str() {
        "TXT" => {
            let owner = absolute_name(&record.name, zone).ok()?;
            Some(Record::from_rdata(
                owner,
                RECORD_TTL,
                RData::TXT(TXT::new(vec![record.value.clone()])),
            ))
        }
        _ => None,
    }
}

/// Resolve a possibly relative record name against its zone.
fn absolute_name(name: &str, zone: &Name) -> Result<Name, Error> {
    if name.is_empty() || name == "@" {
        return Ok(zone.clone());
    }
    let name = Name::from_str(name)?;
    if name.is_fqdn() {
        Ok(name)
    } else {
        Ok(name.append_domain(zone)?)
    }
}

#[async_trait::async_trait]
impl RequestHandler for Handler {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        response_handle: R,
    ) -> ResponseInfo {
        match self.dispatch_request(request, response_handle).await {
            Ok(info) => info,
            Err(err) => {
                // Reply write failures are logged, never retried or
                // propagated; the querier has no error channel either way.
                error!("failed to write DNS reply: {err:?}");
                Header::new().into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zone::InMemoryStorage;
    use std::sync::Arc;

    fn handler() -> Handler {
        let zones = ZoneStore::new(Arc::new(InMemoryStorage::default()));
        Handler::new("oast.example.com", zones).unwrap()
    }

    fn lower(name: &str) -> LowerName {
        LowerName::from(Name::from_str(name).unwrap())
    }

    #[test]
    fn authority_covers_base_and_subdomains_only() {
        let handler = handler();
        assert!(handler.is_authoritative_for(&lower("oast.example.com.")));
        assert!(handler.is_authoritative_for(&lower("deep.sub.oast.example.com.")));
        assert!(!handler.is_authoritative_for(&lower("example.com.")));
        assert!(!handler.is_authoritative_for(&lower("other.test.")));
    }

    #[test]
    fn soa_names_primary_and_mailbox() {
        let handler = handler();
        let record = handler.soa_record(Name::from_str("oast.example.com.").unwrap());
        assert_eq!(record.record_type(), RecordType::SOA);
        assert_eq!(record.ttl(), 0);
        let Some(RData::SOA(soa)) = record.data() else {
            panic!("expected SOA rdata");
        };
        assert_eq!(soa.mname().to_string(), "ns1.oast.example.com.");
        assert_eq!(soa.rname().to_string(), "hostmaster.oast.example.com.");
        assert_eq!(soa.serial(), 1);
        assert_eq!(soa.refresh(), 86_400);
        assert_eq!(soa.retry(), 7_200);
        assert_eq!(soa.expire(), 3_600_000);
        assert_eq!(soa.minimum(), 3_600);
    }

    #[test]
    fn ns_points_at_ns1() {
        let handler = handler();
        let record = handler.ns_record(Name::from_str("oast.example.com.").unwrap());
        let Some(RData::NS(ns)) = record.data() else {
            panic!("expected NS rdata");
        };
        assert_eq!(ns.to_string(), "ns1.oast.example.com.");
    }

    #[tokio::test]
    async fn stored_txt_records_become_verbatim_answers() {
        let zones = ZoneStore::new(Arc::new(InMemoryStorage::default()));
        zones
            .append_records(
                "_acme-challenge.oast.example.com.",
                &[DnsRecord {
                    record_type: "TXT".to_string(),
                    value: "challenge-token".to_string(),
                    ..DnsRecord::default()
                }],
            )
            .await
            .unwrap();
        let handler = Handler::new("oast.example.com", zones).unwrap();

        let name = Name::from_str("_acme-challenge.oast.example.com.").unwrap();
        let answers = handler.stored_records(&name).await.unwrap();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].ttl(), RECORD_TTL);
        let Some(RData::TXT(txt)) = answers[0].data() else {
            panic!("expected TXT rdata");
        };
        assert_eq!(txt.txt_data().len(), 1);
        assert_eq!(txt.txt_data()[0].as_ref(), b"challenge-token");
    }

    #[tokio::test]
    async fn unrecognized_record_types_are_skipped() {
        let zone = Name::from_str("oast.example.com.").unwrap();
        let record = DnsRecord {
            name: "www".to_string(),
            record_type: "CNAME".to_string(),
            value: "elsewhere.test.".to_string(),
            ..DnsRecord::default()
        };
        assert!(record_to_answer(&zone, &record).is_none());
    }

    #[test]
    fn record_names_resolve_against_zone() {
        let zone = Name::from_str("oast.example.com.").unwrap();
        assert_eq!(
            absolute_name("@", &zone).unwrap().to_string(),
            "oast.example.com."
        );
        assert_eq!(
            absolute_name("sub", &zone).unwrap().to_string(),
            "sub.oast.example.com."
        );
        assert_eq!(
            absolute_name("abs.test.", &zone).unwrap().to_string(),
            "abs.test."
        );
    }
}
