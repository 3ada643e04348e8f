use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage,
        EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{info, warn};

use crate::{
    audio::{PlaybackSession, PlayerError},
    bot::{registry, JukeboxBot},
    ui::embeds,
};

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &JukeboxBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    // Los eventos asíncronos se publican donde se usó el último comando
    bot.remember_channel(guild_id, command.channel_id);

    let session = registry(ctx).await?.get_or_create(guild_id);

    match command.data.name.as_str() {
        "join" => handle_join(ctx, &command, guild_id, &session).await?,
        "play" => handle_play(ctx, &command, guild_id, &session).await?,
        "leave" => {
            let result = session.leave().await.map(|()| "👋 Desconectado del canal de voz".to_string());
            reply_result(ctx, &command, result).await?
        }
        "skip" => {
            let result = session.skip().await.map(|skipped| match skipped {
                Some(song) => format!("⏭️ Saltado: **{}**", song.title()),
                None => "⏭️ Saltado".to_string(),
            });
            reply_result(ctx, &command, result).await?
        }
        "pause" => {
            let result = session.pause().await.map(|()| "⏸️ Pausado".to_string());
            reply_result(ctx, &command, result).await?
        }
        "resume" => {
            let result = session.resume().await.map(|()| "▶️ Reanudado".to_string());
            reply_result(ctx, &command, result).await?
        }
        "clear" => {
            let removed = session.clear().await;
            reply(ctx, &command, format!("🗑️ Cola limpiada ({} canciones)", removed), false).await?
        }
        "remove" => handle_remove(ctx, &command, &session).await?,
        "queue" => {
            let snapshot = session.snapshot().await;
            reply_embed(ctx, &command, embeds::create_queue_embed(&snapshot)).await?
        }
        "nowplaying" => match session.now_playing().await {
            Some((song, state)) => {
                reply_embed(ctx, &command, embeds::create_now_playing_embed(&song, state)).await?
            }
            None => reply_result(ctx, &command, Err(PlayerError::NothingPlaying)).await?,
        },
        _ => reply(ctx, &command, "❌ Comando no reconocido", true).await?,
    }

    Ok(())
}

// Handlers específicos para cada comando

async fn handle_join(
    ctx: &Context,
    command: &CommandInteraction,
    guild_id: GuildId,
    session: &PlaybackSession,
) -> Result<()> {
    let Some(channel_id) = get_user_voice_channel(ctx, guild_id, command.user.id) else {
        return reply(ctx, command, "❌ Debes estar en un canal de voz", true).await;
    };

    command.defer(&ctx.http).await?;

    let content = match session.join(channel_id).await {
        Ok(conn) => format!("🔊 Conectado a <#{}>", conn.channel_id),
        Err(e) => {
            warn!("Error al conectar en guild {}: {}", guild_id, e);
            embeds::error_text(&e)
        }
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await?;
    Ok(())
}

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    guild_id: GuildId,
    session: &PlaybackSession,
) -> Result<()> {
    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?
        .to_string();

    let Some(channel_id) = get_user_voice_channel(ctx, guild_id, command.user.id) else {
        return reply(ctx, command, "❌ Debes estar en un canal de voz", true).await;
    };

    // Defer la respuesta ya que puede tomar tiempo
    command.defer(&ctx.http).await?;

    let embed = match session.play(channel_id, &query, command.user.id).await {
        Ok(outcome) => embeds::create_enqueued_embed(&outcome),
        Err(e) => {
            warn!("❌ /play '{}' falló en guild {}: {}", query, guild_id, e);
            embeds::create_error_embed("No se pudo agregar", &embeds::error_text(&e))
        }
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;
    Ok(())
}

async fn handle_remove(
    ctx: &Context,
    command: &CommandInteraction,
    session: &PlaybackSession,
) -> Result<()> {
    let index = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "index")
        .and_then(|opt| opt.value.as_i64())
        .ok_or_else(|| anyhow::anyhow!("Índice no proporcionado"))?;

    let index = usize::try_from(index).unwrap_or(0);
    let result = session
        .remove(index)
        .await
        .map(|song| format!("❌ Quitado de la cola: **{}**", song.title()));
    reply_result(ctx, command, result).await
}

async fn reply(
    ctx: &Context,
    command: &CommandInteraction,
    content: impl Into<String>,
    ephemeral: bool,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(ephemeral),
            ),
        )
        .await?;
    Ok(())
}

async fn reply_embed(ctx: &Context, command: &CommandInteraction, embed: CreateEmbed) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().embed(embed)),
        )
        .await?;
    Ok(())
}

/// Responde con el texto de éxito o con el error (solo visible para el usuario)
async fn reply_result(
    ctx: &Context,
    command: &CommandInteraction,
    result: Result<String, PlayerError>,
) -> Result<()> {
    match result {
        Ok(content) => reply(ctx, command, content, false).await,
        Err(e) => reply(ctx, command, embeds::error_text(&e), true).await,
    }
}

fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}
