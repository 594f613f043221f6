/// Generates the client and server bindings for the `echo.Echo` gRPC service.
///
/// The wire messages (`EchoRequest`, `EchoResponse`) are plain `prost`
/// structs declared in `src/proto.rs`, so the service is described here with
/// `tonic-build`'s manual builder instead of a `.proto` file. This keeps the
/// build free of a `protoc` dependency while producing the same
/// `echo_client`/`echo_server` modules the prost code generator would.
///
/// # Output
///
/// The generated code lands in `OUT_DIR/echo.Echo.rs` and is included by
/// `src/proto.rs`:
///
/// ```rust,ignore
/// include!(concat!(env!("OUT_DIR"), "/echo.Echo.rs"));
/// ```
///
/// # Panics
///
/// Code generation panics on failure, which aborts the build with the
/// generator's message.
fn main() {
    let echo = tonic_build::manual::Method::builder()
        .name("echo")
        .route_name("Echo")
        .input_type("crate::proto::EchoRequest")
        .output_type("crate::proto::EchoResponse")
        .codec_path("tonic_prost::ProstCodec")
        .build();

    let service = tonic_build::manual::Service::builder()
        .name("Echo")
        .package("echo")
        .method(echo)
        .build();

    tonic_build::manual::Builder::new().compile(&[service]);
}
