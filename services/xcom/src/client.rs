//! Xcom session client
//!
//! Turns typed parameter reads and writes into exactly one request/response
//! exchange on a transport. Exchanges are serialized by a mutex, so a client
//! shared between tasks never has two requests in flight.

use bytes::Bytes;
use errors::{XcomError, XcomResult};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info};
use xcom_model::enums::label_for;
use xcom_model::{DataType, Datapoint, Dataset, ValueTuple};
use xcom_protocol::{
    build_request, check_response, decode, encode, ObjectType, Package, PropertyId, QspLevel,
    ServiceId, Value,
};

use crate::config::SessionConfig;
use crate::transport::{Transport, TransportStats};

/// Object id addressed by property-level writes
const PROPERTY_OBJECT_ID: u32 = 0;

/// Client for one Xcom gateway
#[derive(Debug)]
pub struct XcomClient<T: Transport> {
    transport: Mutex<T>,
    dataset: Arc<Dataset>,
    session: SessionConfig,
}

impl<T: Transport> XcomClient<T> {
    /// Client with the standard parameter table
    pub fn new(transport: T, session: SessionConfig) -> Self {
        Self::with_dataset(transport, session, Arc::new(Dataset::standard()))
    }

    pub fn with_dataset(transport: T, session: SessionConfig, dataset: Arc<Dataset>) -> Self {
        Self {
            transport: Mutex::new(transport),
            dataset,
            session,
        }
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    pub fn session(&self) -> &SessionConfig {
        &self.session
    }

    /// Read one property of a parameter or info and decode it as `data_type`
    ///
    /// Ids 3000..=3168 and 7000.. are addressed as user infos, all others as
    /// parameters.
    pub async fn read_parameter(
        &self,
        id: u32,
        data_type: DataType,
        dst_addr: u32,
        property_id: PropertyId,
    ) -> XcomResult<Value> {
        let object_type = ObjectType::for_id(id);
        let request = build_request(
            ServiceId::READ_PROPERTY,
            object_type,
            id,
            property_id,
            Bytes::new(),
            self.session.src_addr,
            dst_addr,
        );

        let reply = self.exchange(&request).await?;
        let value = decode(data_type, reply.payload())?;
        debug!(id, %object_type, dst_addr, %value, "Read parameter");
        Ok(value)
    }

    /// Write one property of a parameter; the reply payload is not used
    pub async fn write_parameter(
        &self,
        id: u32,
        data_type: DataType,
        value: &Value,
        dst_addr: u32,
        property_id: PropertyId,
    ) -> XcomResult<()> {
        let payload = encode(data_type, value)?;
        let request = build_request(
            ServiceId::WRITE_PROPERTY,
            ObjectType::PARAMETER,
            id,
            property_id,
            payload,
            self.session.src_addr,
            dst_addr,
        );

        self.exchange(&request).await?;
        info!(id, dst_addr, %value, "Wrote parameter");
        Ok(())
    }

    /// Read the unsaved value of a datapoint from the default destination
    pub async fn get_value(&self, point: &Datapoint) -> XcomResult<Value> {
        self.read_parameter(
            point.id,
            point.data_type,
            self.session.dst_addr,
            PropertyId::UNSAVED_VALUE,
        )
        .await
    }

    /// Write the unsaved value of a writable datapoint
    pub async fn set_value(&self, point: &Datapoint, value: &Value) -> XcomResult<()> {
        if !point.writable {
            return Err(XcomError::ReadOnlyParameter(point.id));
        }
        self.write_parameter(
            point.id,
            point.data_type,
            value,
            self.session.dst_addr,
            PropertyId::UNSAVED_VALUE,
        )
        .await
    }

    /// Read a datapoint known to the parameter table by id
    pub async fn read_by_id(&self, id: u32) -> XcomResult<Value> {
        let data_type = self
            .dataset
            .lookup(id)
            .map(|info| info.data_type)
            .ok_or_else(|| XcomError::UnknownDatapoint(id.to_string()))?;
        self.read_parameter(id, data_type, self.session.dst_addr, PropertyId::UNSAVED_VALUE)
            .await
    }

    /// Write raw property data to the parameter object itself (object id 0)
    pub async fn set_property(
        &self,
        property_id: PropertyId,
        data: impl Into<Bytes>,
        dst_addr: u32,
    ) -> XcomResult<()> {
        let request = build_request(
            ServiceId::WRITE_PROPERTY,
            ObjectType::PARAMETER,
            PROPERTY_OBJECT_ID,
            property_id,
            data,
            self.session.src_addr,
            dst_addr,
        );
        self.exchange(&request).await?;
        info!(%property_id, dst_addr, "Wrote property");
        Ok(())
    }

    /// Access level a parameter is shown at on the remote control
    pub async fn read_level(&self, id: u32, dst_addr: u32) -> XcomResult<QspLevel> {
        let value = self
            .read_parameter(id, DataType::EnumShort, dst_addr, PropertyId::LEVEL)
            .await?;
        value
            .as_i32()
            .and_then(|code| u16::try_from(code).ok())
            .and_then(QspLevel::from_code)
            .ok_or_else(|| {
                XcomError::UnexpectedResponse(format!("unknown access level {value} for {id}"))
            })
    }

    /// Change the access level of a parameter
    pub async fn set_level(&self, id: u32, level: QspLevel, dst_addr: u32) -> XcomResult<()> {
        self.write_parameter(
            id,
            DataType::EnumShort,
            &Value::ShortEnum(i32::from(level.code())),
            dst_addr,
            PropertyId::LEVEL,
        )
        .await
    }

    /// Label of an enumerated reading, when the datapoint has a known table
    pub fn enum_label(&self, point: &Datapoint, value: &Value) -> Option<&'static ValueTuple> {
        let table = self.dataset.enum_values(point.id)?;
        label_for(table, value.as_i32()?)
    }

    pub async fn stats(&self) -> TransportStats {
        self.transport.lock().await.stats()
    }

    /// Release the transport's link
    pub async fn close(&self) -> XcomResult<()> {
        self.transport.lock().await.close().await
    }

    async fn exchange(&self, request: &Package) -> XcomResult<Package> {
        let mut transport = self.transport.lock().await;
        let budget = self.session.exchange_timeout();

        debug!("Request: {request}");
        let outcome = timeout(budget, transport.exchange(request)).await;
        let reply = match outcome {
            Ok(result) => result?,
            Err(_) => return Err(XcomError::timeout(transport.name().to_string())),
        };
        debug!("Reply: {reply}");

        check_response(&reply)?;
        Ok(reply)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use std::time::Duration;
    use xcom_model::enums::MODE_CHARGE;

    fn session() -> SessionConfig {
        SessionConfig {
            exchange_timeout_ms: 200,
            ..Default::default()
        }
    }

    fn reply_to(object_type: ObjectType, id: u32, payload: Vec<u8>) -> Package {
        build_request(
            ServiceId::READ_PROPERTY,
            object_type,
            id,
            PropertyId::UNSAVED_VALUE,
            Bytes::new(),
            1,
            100,
        )
        .response(payload)
    }

    #[tokio::test]
    async fn test_read_addresses_info_object() {
        let mut mock = MockTransport::new();
        mock.push_response(reply_to(ObjectType::INFO, 3000, 48.5f32.to_le_bytes().to_vec()));
        let client = XcomClient::new(mock, session());

        let value = client
            .read_parameter(3000, DataType::Float, 100, PropertyId::UNSAVED_VALUE)
            .await
            .unwrap();
        assert_eq!(value, Value::Float(48.5));

        let transport = client.transport.lock().await;
        let sent = &transport.sent()[0];
        assert_eq!(sent.service().object_type, ObjectType::INFO);
        assert_eq!(sent.service().object_id, 3000);
        assert!(sent.payload().is_empty());
        assert_eq!(sent.header.dst_addr, 100);
    }

    #[tokio::test]
    async fn test_read_by_id_uses_table_type() {
        let mut mock = MockTransport::new();
        mock.push_response(reply_to(ObjectType::PARAMETER, 1107, 16.0f32.to_le_bytes().to_vec()));
        let client = XcomClient::new(mock, session());

        assert_eq!(client.read_by_id(1107).await.unwrap(), Value::Float(16.0));
        assert!(matches!(
            client.read_by_id(99_999).await,
            Err(XcomError::UnknownDatapoint(_))
        ));
    }

    #[tokio::test]
    async fn test_set_value_refuses_read_only() {
        let client = XcomClient::new(MockTransport::new(), session());
        let point = Datapoint::info(3011, "AC_VOLTAGE_IN", DataType::Float);

        let err = client.set_value(&point, &Value::Float(1.0)).await.unwrap_err();
        assert!(matches!(err, XcomError::ReadOnlyParameter(3011)));
        assert!(client.transport.lock().await.sent().is_empty());
    }

    #[tokio::test]
    async fn test_set_property_targets_object_zero() {
        let mut mock = MockTransport::new();
        let request = build_request(
            ServiceId::WRITE_PROPERTY,
            ObjectType::PARAMETER,
            0,
            PropertyId::LEVEL,
            Bytes::new(),
            1,
            100,
        );
        mock.push_response(request.response(Vec::new()));
        let client = XcomClient::new(mock, session());

        client
            .set_property(PropertyId::LEVEL, vec![0x20, 0x00], 100)
            .await
            .unwrap();

        let transport = client.transport.lock().await;
        let sent = &transport.sent()[0];
        assert_eq!(sent.service().object_id, 0);
        assert_eq!(sent.service().object_type, ObjectType::PARAMETER);
        assert_eq!(&sent.payload()[..], &[0x20, 0x00]);
    }

    #[tokio::test]
    async fn test_access_level_round_trip() {
        let mut mock = MockTransport::new();
        let write = build_request(
            ServiceId::WRITE_PROPERTY,
            ObjectType::PARAMETER,
            1138,
            PropertyId::LEVEL,
            Bytes::new(),
            1,
            100,
        );
        mock.push_response(write.response(Vec::new()));
        mock.push_response(reply_to(ObjectType::PARAMETER, 1138, vec![0x20, 0x00]));
        mock.push_response(reply_to(ObjectType::PARAMETER, 1138, vec![0x15, 0x00]));
        let client = XcomClient::new(mock, session());

        client.set_level(1138, QspLevel::Expert, 100).await.unwrap();
        assert_eq!(client.read_level(1138, 100).await.unwrap(), QspLevel::Expert);
        assert!(matches!(
            client.read_level(1138, 100).await,
            Err(XcomError::UnexpectedResponse(_))
        ));

        let transport = client.transport.lock().await;
        let sent = transport.sent();
        assert_eq!(sent[0].service().property_id, PropertyId::LEVEL);
        assert_eq!(sent[0].service().object_type, ObjectType::PARAMETER);
        assert_eq!(&sent[0].payload()[..], &[0x20, 0x00]);
        assert_eq!(sent[1].service().property_id, PropertyId::LEVEL);
    }

    #[tokio::test]
    async fn test_error_reply_is_classified() {
        let mut mock = MockTransport::new();
        mock.push_response(reply_to(ObjectType::PARAMETER, 1138, Vec::new()).error_response(0x0022));
        let client = XcomClient::new(mock, session());

        let err = client
            .write_parameter(1138, DataType::Float, &Value::Float(12.5), 100, PropertyId::UNSAVED_VALUE)
            .await
            .unwrap_err();
        match err {
            XcomError::Protocol { code, label } => {
                assert_eq!(code, 0x0022);
                assert_eq!(label, "OBJECT_ID_NOT_FOUND");
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_silent_transport_times_out() {
        let client = XcomClient::new(MockTransport::silent(), session());

        let started = std::time::Instant::now();
        let err = client.read_by_id(3011).await.unwrap_err();
        assert!(matches!(err, XcomError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_enum_label() {
        let client = XcomClient::new(MockTransport::new(), session());
        let mode = client.dataset().get(11016).unwrap().clone();

        assert_eq!(
            client.enum_label(&mode, &Value::ShortEnum(8)),
            Some(&MODE_CHARGE)
        );
        assert_eq!(client.enum_label(&mode, &Value::ShortEnum(2)), None);
        let voltage = client.dataset().get(3011).unwrap().clone();
        assert_eq!(client.enum_label(&voltage, &Value::Float(8.0)), None);
    }
}
