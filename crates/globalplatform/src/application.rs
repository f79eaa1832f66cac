//! GlobalPlatform command façade
//!
//! Sequences SELECT, INITIALIZE UPDATE and EXTERNAL AUTHENTICATE into an
//! authenticated SCP02 session against the issuer security domain, then
//! exposes the applet lifecycle operations (delete, install, load) over
//! the wrapped channel.

use std::path::Path;

use rand::RngCore;
use tracing::{debug, warn};

use chiave_apdu_core::{CardTransport, Command, Response};

use crate::commands;
use crate::constants::ISD_AID;
use crate::load::LoadCommandStream;
use crate::secure_channel::Scp02Wrapper;
use crate::session::{Keys, Session};
use crate::{Error, Result};

/// Progress callback for CAP loading: `(blocks_sent, blocks_total)`
pub type LoadingCallback<'a> = &'a mut dyn FnMut(usize, usize);

/// Session-scoped façade over one transport for card administration
pub struct GlobalPlatform<T: CardTransport> {
    transport: T,
    session: Option<Session>,
    wrapper: Option<Scp02Wrapper>,
}

impl<T: CardTransport> std::fmt::Debug for GlobalPlatform<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalPlatform")
            .field("authenticated", &self.session.is_some())
            .finish_non_exhaustive()
    }
}

impl<T: CardTransport> GlobalPlatform<T> {
    /// Create a new façade over a transport
    pub const fn new(transport: T) -> Self {
        Self {
            transport,
            session: None,
            wrapper: None,
        }
    }

    /// Whether the administrative channel is authenticated
    pub const fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// SELECT the issuer security domain. Any previous session state is
    /// discarded: a new SELECT always starts unauthenticated.
    pub fn select_isd(&mut self) -> Result<Response> {
        self.session = None;
        self.wrapper = None;

        let response = self.transmit(&commands::select(ISD_AID))?;
        response.check_ok().map_err(Error::from_apdu)?;
        Ok(response)
    }

    /// Open the SCP02 channel: INITIALIZE UPDATE with a random host
    /// challenge, key-set trial against the card cryptogram, then a
    /// wrapped EXTERNAL AUTHENTICATE.
    pub fn open_secure_channel(&mut self) -> Result<()> {
        let mut host_challenge = [0u8; 8];
        rand::rng().fill_bytes(&mut host_challenge);

        let response = self.transmit(&commands::initialize_update(&host_challenge))?;
        response.check_ok().map_err(Error::from_apdu)?;

        // Production cards carry the Status key set, development cards the
        // GlobalPlatform test keys. Whichever verifies the card cryptogram
        // becomes the active set.
        let session = [Keys::status_keys(), Keys::default_keys()]
            .iter()
            .find_map(|keys| {
                Session::new(keys, response.payload(), &host_challenge)
                    .inspect_err(|e| debug!(error = %e, "key set rejected"))
                    .ok()
            })
            .ok_or(Error::AuthenticationFailed(
                "card cryptogram did not verify under any known key set",
            ))?;

        let mut wrapper = Scp02Wrapper::new(*session.keys().mac());

        let auth_cmd = commands::external_authenticate(&session.host_cryptogram());
        let wrapped = wrapper.wrap_command(&auth_cmd);
        let response = self.transmit(&wrapped)?;
        if !response.is_success() {
            warn!(status = %response.status(), "EXTERNAL AUTHENTICATE rejected");
            return Err(Error::AuthenticationFailed("EXTERNAL AUTHENTICATE failed"));
        }

        self.session = Some(session);
        self.wrapper = Some(wrapper);
        debug!("SCP02 channel established");
        Ok(())
    }

    /// DELETE an object (and its related objects) by AID
    pub fn delete_object(&mut self, aid: &[u8]) -> Result<()> {
        let response = self.send_wrapped(&commands::delete(aid))?;
        response.check_ok().map_err(Error::from_apdu)?;
        Ok(())
    }

    /// INSTALL [for load], announcing a package upload to the ISD
    pub fn install_for_load(&mut self, package_aid: &[u8]) -> Result<()> {
        let response = self.send_wrapped(&commands::install_for_load(package_aid, &[]))?;
        response.check_ok().map_err(Error::from_apdu)?;
        Ok(())
    }

    /// INSTALL [for install and make selectable], creating an applet
    /// instance with the given parameters
    pub fn install_for_install(
        &mut self,
        package_aid: &[u8],
        applet_aid: &[u8],
        instance_aid: &[u8],
        params: &[u8],
    ) -> Result<()> {
        let cmd = commands::install_for_install(package_aid, applet_aid, instance_aid, params);
        let response = self.send_wrapped(&cmd)?;
        response.check_ok().map_err(Error::from_apdu)?;
        Ok(())
    }

    /// Stream a CAP file to the card as LOAD blocks
    pub fn load_cap_file<P: AsRef<Path>>(
        &mut self,
        path: P,
        mut callback: Option<LoadingCallback<'_>>,
    ) -> Result<()> {
        let mut stream = LoadCommandStream::from_file(path)?;
        let total = stream.blocks_count();

        while let Some((is_last, index, block)) = stream.next_block() {
            let cmd = commands::load_block(index, is_last, block);
            let wrapper = self.wrapper.as_mut().ok_or(Error::NoSecureChannel)?;
            let wrapped = wrapper.wrap_command(&cmd);

            let raw = self.transport.transmit_raw(&wrapped.to_bytes())?;
            let response = Response::from_bytes(&raw)?;
            response.check_ok().map_err(Error::from_apdu)?;

            if let Some(callback) = callback.as_mut() {
                callback(index as usize + 1, total);
            }
        }

        Ok(())
    }

    /// Send a command over the authenticated channel
    fn send_wrapped(&mut self, command: &Command) -> Result<Response> {
        let wrapper = self.wrapper.as_mut().ok_or(Error::NoSecureChannel)?;
        let wrapped = wrapper.wrap_command(command);
        let raw = self.transport.transmit_raw(&wrapped.to_bytes())?;
        Ok(Response::from_bytes(&raw)?)
    }

    /// Send a command in clear (selection and channel setup)
    fn transmit(&mut self, command: &Command) -> Result<Response> {
        let raw = self.transport.transmit_raw(&command.to_bytes())?;
        Ok(Response::from_bytes(&raw)?)
    }
}
