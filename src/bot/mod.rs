//! # Bot Module
//!
//! Discord front end for the jukebox.
//!
//! [`JukeboxBot`] implements Serenity's [`EventHandler`]: it registers the
//! slash commands, dispatches interactions to [`handlers`] and feeds voice
//! state updates into the [`SessionRegistry`]. Session events are posted by
//! [`relay_events`] to the text channel where each guild last issued a
//! command.

use anyhow::Result;
use dashmap::DashMap;
use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
    builder::CreateMessage,
    http::Http,
    prelude::TypeMapKey,
};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod handlers;

use crate::{
    audio::{GuildEvent, SessionRegistry, VoiceStateChange},
    config::Config,
    ui::embeds,
};

/// Clave del registro de sesiones dentro de `Context::data`
pub struct RegistryKey;

impl TypeMapKey for RegistryKey {
    type Value = Arc<SessionRegistry>;
}

/// Canal de texto donde cada guild usó su último comando
pub type AnnounceChannels = Arc<DashMap<GuildId, ChannelId>>;

pub(crate) async fn registry(ctx: &Context) -> Result<Arc<SessionRegistry>> {
    ctx.data
        .read()
        .await
        .get::<RegistryKey>()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("Registro de sesiones no inicializado"))
}

/// Main Discord event handler.
pub struct JukeboxBot {
    config: Arc<Config>,
    announce: AnnounceChannels,
}

impl JukeboxBot {
    pub fn new(config: Config, announce: AnnounceChannels) -> Self {
        Self {
            config: Arc::new(config),
            announce,
        }
    }

    pub fn remember_channel(&self, guild_id: GuildId, channel_id: ChannelId) {
        self.announce.insert(guild_id, channel_id);
    }

    /// Registers slash commands, per guild when `GUILD_ID` is set.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");
        info!("🔧 Application ID: {}", self.config.application_id);

        match self.config.guild_id {
            Some(guild_id) => {
                info!("🏠 Registrando comandos para guild específica: {}", guild_id);
                let guild_id = GuildId::new(guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id)
                    .await
                    .map_err(|e| {
                        error!("❌ Error registrando comandos de guild: {:?}", e);
                        anyhow::anyhow!("No se pudieron registrar comandos de guild. Verifica que el bot tenga permisos de 'applications.commands' en la guild.")
                    })?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                info!("🌐 Registrando comandos globalmente");
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Error registrando comandos globales: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos globales. Verifica que el bot tenga permisos de 'applications.commands'.")
                })?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for JukeboxBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command_interaction) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    /// Translates gateway voice updates into session membership changes.
    ///
    /// Other bots are ignored; the bot's own updates drive forced-disconnect
    /// and channel-move handling.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(guild_id) = new.guild_id else {
            return;
        };

        let is_self = new.user_id == ctx.cache.current_user().id;
        let is_other_bot = new.member.as_ref().is_some_and(|m| m.user.bot);
        if is_other_bot && !is_self {
            return;
        }

        let change = VoiceStateChange {
            member: new.user_id,
            is_self,
            before: old.and_then(|state| state.channel_id),
            after: new.channel_id,
        };
        if change.before == change.after && !is_self {
            // Mute, deafen, stream... no cambia la ocupación
            return;
        }

        match registry(&ctx).await {
            Ok(registry) => registry.on_voice_state_changed(guild_id, change).await,
            Err(e) => error!("Error al procesar voice state: {:?}", e),
        }
    }
}

/// Posts every session event to the guild's announce channel.
pub async fn relay_events(
    http: Arc<Http>,
    announce: AnnounceChannels,
    mut inbox: UnboundedReceiver<GuildEvent>,
) {
    while let Some(GuildEvent { guild_id, event }) = inbox.recv().await {
        let Some(channel_id) = announce.get(&guild_id).map(|c| *c) else {
            debug!("Sin canal de anuncios para guild {}, evento descartado", guild_id);
            continue;
        };

        let message = CreateMessage::new().embed(embeds::create_event_embed(&event));
        if let Err(e) = channel_id.send_message(&http, message).await {
            warn!("⚠️ No se pudo anunciar en guild {}: {}", guild_id, e);
        }
    }
    info!("📭 Relay de eventos terminado");
}
