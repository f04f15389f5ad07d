//! Two models coupled over a Unix domain socket.
//!
//! A "producer" model sends a step counter and a temperature profile per
//! time step; a "consumer" model receives them with a generic channel that
//! learns the message type from the first header.
//!
//! Run with:
//!   cargo run --example coupled-models

#[cfg(unix)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::fs;
    use std::thread;

    use modelwire::transport::{PacketConfig, UnixDomainSocket};
    use modelwire::types::Scalar;
    use modelwire::{ArgList, Channel, Direction, Recv, ScalarSubtype, TypeSpec, Value};

    let sock_dir = std::env::temp_dir().join(format!("modelwire-coupled-{}", std::process::id()));
    fs::create_dir_all(&sock_dir)?;
    let sock_path = sock_dir.join("profile.sock");
    let listener = UnixDomainSocket::bind(&sock_path)?;
    eprintln!("Listening on {}", sock_path.display());

    let profile = TypeSpec::json_object([
        ("step", TypeSpec::json_scalar(ScalarSubtype::Uint, 32)?),
        ("temperature", TypeSpec::array_1d(ScalarSubtype::Float, 64, None)?),
    ])?;

    let address = sock_path.display().to_string();
    let producer = thread::spawn(move || -> Result<(), modelwire::ChannelError> {
        let mut channel = Channel::new("producer:profile", Direction::Send, profile.clone());
        channel.bind(address.clone())?;
        channel.connect(UnixDomainSocket::connect(&address, PacketConfig::default())?)?;
        for step in 0..3u32 {
            let temperature: Vec<f64> = (0..5).map(|i| 280.0 + f64::from(step + i)).collect();
            let args = ArgList::new()
                .with(Scalar::U32(step))
                .with_elements(&temperature)
                .with_size(temperature.len());
            channel.send(&Value::new(profile.clone(), args)?)?;
        }
        channel.send_eof()
    });

    let mut consumer = Channel::new("consumer:profile", Direction::Recv, TypeSpec::any());
    consumer.bind(sock_path.display().to_string())?;
    consumer.connect(listener.accept()?)?;

    while let Recv::Message(value) = consumer.recv()? {
        let step = value.args().get(0).and_then(|arg| arg.as_scalar()).copied();
        let temperature = value
            .args()
            .get(1)
            .and_then(|arg| arg.as_buffer())
            .and_then(|buffer| buffer.to_elements::<f64>());
        eprintln!("step {step:?}: {temperature:?}");
    }
    eprintln!("Producer finished; learned type {}", consumer.datatype());

    producer
        .join()
        .map_err(|_| "producer thread panicked")??;
    drop(listener);
    let _ = fs::remove_dir_all(&sock_dir);
    Ok(())
}

#[cfg(not(unix))]
fn main() {
    eprintln!("This example needs Unix domain sockets.");
}
